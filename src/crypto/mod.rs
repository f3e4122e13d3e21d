pub mod gateway;
pub mod primitive;

pub use gateway::{EncryptionGateway, ValueClass};
pub use primitive::{AesGcmCipher, CipherPrimitive, PassthroughCipher};
