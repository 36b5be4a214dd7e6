#![no_main]

use http::StatusCode;
use libfuzzer_sys::fuzz_target;
use modkit_reply::ResponseBuilder;

fuzz_target!(|data: &[u8]| {
    let mut resp = ResponseBuilder::new();
    resp.set_option("pushAfterCritical", data.first().is_some_and(|b| b & 1 == 1));

    // Each pair of bytes is one builder operation
    let mut errors = 0usize;
    for pair in data.chunks(2) {
        let arg = pair.get(1).copied().unwrap_or_default();
        match pair[0] % 5 {
            0 => {
                resp.add_data(arg);
            }
            1 => {
                resp.add_keyed_data(format!("k{}", arg % 8), arg);
            }
            2 => {
                resp.add_keyed_data(arg.to_string(), "indexed");
            }
            3 => {
                resp.add_error(format!("e{arg}"));
                errors += 1;
            }
            _ => {
                errors += 1;
                if resp.add_error("fatal").critical(true).is_err() {
                    break;
                }
            }
        }
    }

    // An escalation with pushAfterCritical already emitted the reply
    let Ok(reply) = resp.finalize(StatusCode::OK) else {
        return;
    };
    let body: serde_json::Value = serde_json::from_str(reply.body()).expect("body is valid JSON");
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(errors));
});
