#![no_main]

use http_observe::request_target::{CallTarget, Scheme};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let target = CallTarget::from(input);
        // Strict resolution may fail; lossy resolution never panics and
        // always yields a URL
        let _ = target.resolve(Scheme::Http);
        let descriptor = target.resolve_lossy(Scheme::Https);
        assert!(descriptor.path.starts_with('/'));
        let _ = descriptor.url();
    }
});
