//! Options for the browser's platform credential ceremony.
//!
//! The browser runs `navigator.credentials.create/get` with these options
//! and reports back only the credential id, which is matched against the
//! profile store's credential index.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use crate::services::encryption::random_bytes;

pub const RELYING_PARTY_NAME: &str = "AuditGig Safety";
pub const CEREMONY_TIMEOUT_MS: u64 = 60_000;

const CHALLENGE_LEN: usize = 32;
const USER_HANDLE_LEN: usize = 16;

/// COSE ES256 and RS256.
const SUPPORTED_ALGORITHMS: [i32; 2] = [-7, -257];

#[derive(Debug, Serialize)]
pub struct RelyingParty {
    pub name: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUser {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialParam {
    pub alg: i32,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: CredentialUser,
    pub pub_key_cred_params: Vec<CredentialParam>,
    pub timeout: u64,
    pub attestation: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionOptions {
    pub challenge: String,
    pub timeout: u64,
    pub user_verification: &'static str,
}

pub fn registration_options(rp_id: &str, email: &str, display_name: &str) -> RegistrationOptions {
    RegistrationOptions {
        challenge: encoded_random(CHALLENGE_LEN),
        rp: RelyingParty {
            name: RELYING_PARTY_NAME,
            id: rp_id.to_string(),
        },
        user: CredentialUser {
            id: encoded_random(USER_HANDLE_LEN),
            name: email.to_string(),
            display_name: display_name.to_string(),
        },
        pub_key_cred_params: SUPPORTED_ALGORITHMS
            .iter()
            .map(|&alg| CredentialParam {
                alg,
                kind: "public-key",
            })
            .collect(),
        timeout: CEREMONY_TIMEOUT_MS,
        attestation: "none",
    }
}

pub fn assertion_options() -> AssertionOptions {
    AssertionOptions {
        challenge: encoded_random(CHALLENGE_LEN),
        timeout: CEREMONY_TIMEOUT_MS,
        user_verification: "required",
    }
}

fn encoded_random(len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(len))
}
