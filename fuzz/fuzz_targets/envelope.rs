#![no_main]
use libfuzzer_sys::fuzz_target;
use ncparse::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(envelope) = Envelope::parse(s) {
            let _ = envelope.expect_command("namecheap.domains.check");
            let _ = envelope.into_result();
        }
    }
});
