#![no_main]
use libfuzzer_sys::fuzz_target;
use ncparse::{Config, Parser};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut parser = Parser::new(s);
        let lenient = parser.parse();
        if let Ok(strict) = parser.parse_strict() {
            assert_eq!(strict, lenient);
        }
        let _ = Parser::with_config(s, Config::new(4, 0)).parse_element();
    }
});
