#![allow(clippy::panic_in_result_fn)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]

use std::time::{Duration, Instant};

use ncparse::{parse, parse_strict, parse_with_config, Config, ErrorKind, Parser, Value};

fn nested(depth: usize) -> String {
    let mut input = String::with_capacity(depth * 8);
    for _ in 0..depth {
        input.push_str("<n>");
    }
    input.push('x');
    for _ in 0..depth {
        input.push_str("</n>");
    }
    input
}

#[test]
fn test_max_input_size() {
    let config = Config::default();
    let large_input = format!("<A>{}</A>", "0".repeat(config.max_size));

    let mut parser = Parser::new(&large_input);
    let value = parser.parse();
    assert_eq!(value.as_text().map(str::len), Some(large_input.len()));
    assert!(matches!(
        parser.degradations()[0].kind(),
        ErrorKind::MaxSizeExceeded { max } if *max == config.max_size
    ));
    assert!(parse_strict(&large_input).is_err());
}

#[test]
fn test_size_limit_is_configurable() {
    let input = "<A>0123456789</A>";
    assert_eq!(parse_with_config(input, Config::new(0, 8)), Value::from(input));
    assert_eq!(
        parse_with_config(input, Config::new(0, input.len())),
        parse(input)
    );
}

#[test]
fn test_stack_overflow_prevention() {
    let config = Config::default();
    let input = nested(usize::from(config.max_depth) + 1);

    let mut parser = Parser::new(&input);
    let value = parser.parse();
    assert!(value.is_node());
    assert!(matches!(
        parser.degradations()[0].kind(),
        ErrorKind::MaxDepthExceeded { max } if *max == config.max_depth
    ));

    // the innermost element within the limit holds the raw overflow
    let mut current = value.get("n").unwrap();
    for _ in 1..config.max_depth {
        current = current.get("n").unwrap();
    }
    assert_eq!(current.get("n"), Some(&Value::from("<n>x</n>")));
}

#[test]
fn test_depth_within_limit_parses_strictly() {
    let input = nested(usize::from(Config::default().max_depth));
    assert!(parse_strict(&input).is_ok());
}

#[test]
fn test_very_deep_nesting_does_not_overflow() {
    let input = nested(50_000);
    let value = parse(&input);
    assert!(value.is_node());
}

#[test]
fn test_unlimited_config() {
    let input = nested(300);
    let mut parser = Parser::with_config(&input, Config::unlimited());
    let _ = parser.parse();
    assert!(!parser.is_degraded());
}

#[test]
fn test_many_unclosed_tags() {
    let input = "<a>".repeat(10_000);
    assert_eq!(parse(&input), Value::from(input.as_str()));
    assert!(parse_strict(&input).is_err());
}

#[test]
fn test_many_siblings() {
    let input = format!("<R>{}</R>", "<C/>".repeat(20_000));
    let value = parse(&input);
    let seq = value.get("R").and_then(|r| r.get("C")).unwrap();
    assert_eq!(seq.as_sequence().map(|s| s.len()), Some(20_000));
}

#[test]
fn test_quoted_angle_brackets_in_attributes() {
    let value = parse(r#"<R Note="a > b" Other='x>y'><C>1</C></R>"#);
    let r = value.get("R").unwrap();
    assert_eq!(r.get("Note"), Some(&Value::from("a > b")));
    assert_eq!(r.get("C"), Some(&Value::from("1")));
}

/// Parse time for `input(k)` and `input(4 * k)`, best of three runs each
fn scaling(input: impl Fn(usize) -> String, k: usize) -> (Duration, Duration) {
    let time = |n: usize| {
        let source = input(n);
        (0..3)
            .map(|_| {
                let started = Instant::now();
                let _ = parse(&source);
                started.elapsed()
            })
            .min()
            .unwrap()
    };
    (time(k), time(4 * k))
}

fn assert_roughly_linear((small, large): (Duration, Duration)) {
    // quadratic growth would be 16x; allow generous noise above linear 4x
    assert!(
        large < small * 10 + Duration::from_millis(50),
        "parse time grew from {small:?} to {large:?} for 4x the input"
    );
}

#[test]
fn test_many_stray_closing_tags_scale_linearly() {
    let input = |k: usize| format!("<a>{}</a>", "x</c>".repeat(k));

    let source = input(1_000);
    let mut parser = Parser::new(&source);
    let _ = parser.parse();
    assert_eq!(parser.degradations().len(), 1_000);
    assert_eq!(parser.degradations()[999].span().start.col, 4 + 999 * 5 + 1);

    assert_roughly_linear(scaling(input, 20_000));
}

#[test]
fn test_many_unterminated_opening_tags_scale_linearly() {
    let input = |k: usize| format!("<a>{}", "<a ".repeat(k));
    let source = input(100);
    assert_eq!(parse(&source), Value::from(source.trim()));

    assert_roughly_linear(scaling(input, 20_000));
}

#[test]
fn test_stray_markup_on_many_lines_is_located() {
    let source = format!("<a>{}</a>", "\nx</c>".repeat(200_000));
    let started = Instant::now();
    let mut parser = Parser::new(&source);
    let _ = parser.parse();
    let elapsed = started.elapsed();

    let last = parser.degradations().last().unwrap().span().start;
    assert_eq!((last.line, last.col), (200_001, 2));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
