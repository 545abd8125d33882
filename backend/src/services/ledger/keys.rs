//! Ed25519 ledger keys, derived in-process.
//!
//! A wallet is 16 bytes of entropy. The signing key is the first half of
//! SHA-512 over that entropy, the public key is the ed25519 point prefixed
//! with `0xED`, and the account id is RIPEMD-160 of SHA-256 of the public
//! key. Seeds and addresses use base58check with the ripple alphabet.

use ed25519_dalek::{Signer, SigningKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use super::{GeneratedWallet, LedgerSeed};

const ACCOUNT_ID_VERSION: [u8; 1] = [0x00];
const ED25519_SEED_VERSION: [u8; 3] = [0x01, 0xE1, 0x4B];
const ED25519_KEY_PREFIX: u8 = 0xED;

pub const ENTROPY_LEN: usize = 16;
pub const ACCOUNT_ID_LEN: usize = 20;

pub struct LedgerKeypair {
    signing: SigningKey,
    public_key: [u8; 33],
}

impl LedgerKeypair {
    pub fn from_entropy(entropy: &[u8; ENTROPY_LEN]) -> Self {
        let digest = Sha512::digest(entropy);
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&digest[..32]);
        let signing = SigningKey::from_bytes(&secret);

        let mut public_key = [0u8; 33];
        public_key[0] = ED25519_KEY_PREFIX;
        public_key[1..].copy_from_slice(&signing.verifying_key().to_bytes());
        Self {
            signing,
            public_key,
        }
    }

    /// `None` unless `seed` is an ed25519 family seed (`sEd...`).
    pub fn from_seed(seed: &LedgerSeed) -> Option<Self> {
        decode_seed(seed.expose()).map(|entropy| Self::from_entropy(&entropy))
    }

    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(self.public_key)
    }

    pub fn account_id(&self) -> [u8; ACCOUNT_ID_LEN] {
        let digest = Ripemd160::digest(Sha256::digest(self.public_key));
        let mut id = [0u8; ACCOUNT_ID_LEN];
        id.copy_from_slice(&digest);
        id
    }

    pub fn address(&self) -> String {
        encode_address(&self.account_id())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerKeypair({})", self.public_key_hex())
    }
}

/// Fresh wallet from the thread-local CSPRNG.
pub fn generate_wallet() -> GeneratedWallet {
    wallet_from_entropy(&rand::random::<[u8; ENTROPY_LEN]>())
}

pub fn wallet_from_entropy(entropy: &[u8; ENTROPY_LEN]) -> GeneratedWallet {
    let keypair = LedgerKeypair::from_entropy(entropy);
    GeneratedWallet {
        address: keypair.address(),
        public_key: keypair.public_key_hex(),
        seed: LedgerSeed::new(encode_check(&ED25519_SEED_VERSION, entropy)),
    }
}

pub fn encode_address(account_id: &[u8; ACCOUNT_ID_LEN]) -> String {
    encode_check(&ACCOUNT_ID_VERSION, account_id)
}

pub fn decode_address(address: &str) -> Option<[u8; ACCOUNT_ID_LEN]> {
    let body = decode_check(address, &ACCOUNT_ID_VERSION, ACCOUNT_ID_LEN)?;
    let mut id = [0u8; ACCOUNT_ID_LEN];
    id.copy_from_slice(&body);
    Some(id)
}

fn decode_seed(seed: &str) -> Option<[u8; ENTROPY_LEN]> {
    let body = decode_check(seed.trim(), &ED25519_SEED_VERSION, ENTROPY_LEN)?;
    let mut entropy = [0u8; ENTROPY_LEN];
    entropy.copy_from_slice(&body);
    Some(entropy)
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    [digest[0], digest[1], digest[2], digest[3]]
}

fn encode_check(version: &[u8], body: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(version.len() + body.len() + 4);
    bytes.extend_from_slice(version);
    bytes.extend_from_slice(body);
    let sum = checksum(&bytes);
    bytes.extend_from_slice(&sum);
    bs58::encode(bytes)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_string()
}

fn decode_check(encoded: &str, version: &[u8], body_len: usize) -> Option<Vec<u8>> {
    let bytes = bs58::decode(encoded)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .ok()?;
    if bytes.len() != version.len() + body_len + 4 || !bytes.starts_with(version) {
        return None;
    }
    let (payload, sum) = bytes.split_at(bytes.len() - 4);
    if checksum(payload).as_slice() != sum {
        return None;
    }
    Some(payload[version.len()..].to_vec())
}
