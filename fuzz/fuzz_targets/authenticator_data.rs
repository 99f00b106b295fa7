#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = webauthn_rp::authenticator_data::AuthenticatorData::parse(data);
});
