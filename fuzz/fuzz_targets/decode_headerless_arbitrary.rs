#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = smile_pack::decode_headerless(data) {
        let bytes = smile_pack::encode(&value).expect("re-encoding a decoded value");
        let again = smile_pack::decode(&bytes).expect("decoding our own output");
        if value != again {
            // NaN is the one value that never compares equal to itself.
            assert!(format!("{:?}", value).contains("NaN"));
        }
    }
});
