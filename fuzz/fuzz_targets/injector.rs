#![no_main]

use kernelforge::codegen::{BufferInjector, Template};
use kernelforge::ir::PlaceholderTable;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = core::str::from_utf8(data) {
        let table = PlaceholderTable::new();
        let mut injector = BufferInjector::new(&table);
        injector.register("fuzz_N", 7usize);
        let template = Template::parse(src);
        let _ = injector.inject(&template);
    }
});
