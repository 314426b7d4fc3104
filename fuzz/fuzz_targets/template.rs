#![no_main]

use kernelforge::codegen::Template;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = core::str::from_utf8(data) {
        let template = Template::parse(src);
        assert_eq!(template.render(), src);
    }
});
