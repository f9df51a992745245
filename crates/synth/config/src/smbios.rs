//! SMBIOS identity: model, serials, ROM and UUID.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

use ocforge_core::ExternalTools;

use crate::ConfigError;

/// Serial used when the generator cannot run.
pub const PLACEHOLDER_SERIAL: &str = "A0000000000Z";
/// Board serial used when the generator cannot run.
pub const PLACEHOLDER_MLB: &str = "A00000000000000009";

/// The identity written into `PlatformInfo.Generic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmbiosIdentity {
    /// Board serial.
    #[serde(rename = "MLB")]
    pub mlb: String,
    /// Primary network MAC, six bytes.
    #[serde(rename = "ROM", with = "rom_hex")]
    pub rom: [u8; 6],
    /// Mac model.
    #[serde(rename = "SystemProductName")]
    pub system_product_name: String,
    /// System serial.
    #[serde(rename = "SystemSerialNumber")]
    pub system_serial_number: String,
    /// Canonical uppercase UUID.
    #[serde(rename = "SystemUUID")]
    pub system_uuid: String,
}

mod rom_hex {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(rom: &[u8; 6], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode_upper(rom))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 6], D::Error> {
        let text = String::deserialize(d)?;
        let mut rom = [0u8; 6];
        hex::decode_to_slice(&text, &mut rom).map_err(D::Error::custom)?;
        Ok(rom)
    }
}

impl SmbiosIdentity {
    /// ROM as 12 uppercase hex digits.
    #[must_use]
    pub fn rom_hex(&self) -> String {
        hex::encode_upper(self.rom)
    }

    /// Returns `true` if the serials are the placeholders.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.system_serial_number == PLACEHOLDER_SERIAL
    }

    /// A seed derived from the identity, for builds that must repeat
    /// exactly while the identity is kept.
    #[must_use]
    pub fn seed(&self) -> u64 {
        match Uuid::parse_str(&self.system_uuid) {
            Ok(uuid) => {
                let (hi, lo) = uuid.as_u64_pair();
                hi ^ lo
            }
            // FNV-1a over the serial.
            Err(_) => self
                .system_serial_number
                .bytes()
                .fold(0xCBF2_9CE4_8422_2325, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01B3)),
        }
    }
}

/// Generates a fresh identity for `model`.
///
/// Serial generator failures are logged and leave placeholder serials.
pub fn generate<R: Rng + ?Sized>(model: &str, tools: &dyn ExternalTools, rng: &mut R) -> SmbiosIdentity {
    let (serial, mlb) = match tools.generate_serial(model) {
        Ok(pairs) => match pairs.into_iter().next() {
            Some(pair) => pair,
            None => {
                log::warn!("serial generator returned nothing for {model}, using placeholders");
                (PLACEHOLDER_SERIAL.to_string(), PLACEHOLDER_MLB.to_string())
            }
        },
        Err(e) => {
            log::warn!("serial generator failed ({e}), using placeholders");
            (PLACEHOLDER_SERIAL.to_string(), PLACEHOLDER_MLB.to_string())
        }
    };
    let rom: [u8; 6] = rng.r#gen();
    let uuid = Builder::from_random_bytes(rng.r#gen()).into_uuid();
    SmbiosIdentity {
        mlb,
        rom,
        system_product_name: model.to_string(),
        system_serial_number: serial,
        system_uuid: uuid.hyphenated().to_string().to_uppercase(),
    }
}

/// Reads a saved identity; `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<SmbiosIdentity>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map(Some).map_err(|source| ConfigError::Smbios { path: path.to_path_buf(), source })
}

/// Saves `identity` as JSON.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn save(path: &Path, identity: &SmbiosIdentity) -> Result<(), ConfigError> {
    let text = serde_json::to_string_pretty(identity).map_err(|source| ConfigError::Smbios { path: path.to_path_buf(), source })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

/// The saved identity when `preserve` is set and one exists for `model`,
/// otherwise a fresh one.
///
/// # Errors
///
/// Fails only if a saved identity exists but is unreadable.
pub fn resolve<R: Rng + ?Sized>(
    saved: &Path,
    preserve: bool,
    model: &str,
    tools: &dyn ExternalTools,
    rng: &mut R,
) -> Result<SmbiosIdentity, ConfigError> {
    if preserve {
        match load(saved)? {
            Some(identity) if identity.system_product_name == model => {
                log::info!("reusing SMBIOS identity from {}", saved.display());
                return Ok(identity);
            }
            Some(identity) => log::info!("saved identity is for {}, generating one for {model}", identity.system_product_name),
            None => {}
        }
    }
    Ok(generate(model, tools, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocforge_core::{CompileOutcome, Disassembly, ToolError};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    struct Serials(Option<(&'static str, &'static str)>);

    impl ExternalTools for Serials {
        fn compile_asl(&self, _dsl: &Path) -> Result<CompileOutcome, ToolError> {
            Err(ToolError::NotFound("iasl".into()))
        }

        fn disassemble(&self, _tables: &[PathBuf], _scratch: &Path) -> Result<Disassembly, ToolError> {
            Err(ToolError::NotFound("iasl".into()))
        }

        fn generate_serial(&self, _model: &str) -> Result<Vec<(String, String)>, ToolError> {
            match self.0 {
                Some((s, m)) => Ok(vec![(s.into(), m.into())]),
                None => Err(ToolError::NotFound("macserial".into())),
            }
        }
    }

    #[test]
    fn identity_fields_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate("iMac20,2", &Serials(Some(("C02ABCDEFGHJ", "C02123456789ABCDE"))), &mut rng);
        assert_eq!(id.system_serial_number, "C02ABCDEFGHJ");
        assert_eq!(id.mlb, "C02123456789ABCDE");

        let rom = id.rom_hex();
        assert_eq!(rom.len(), 12);
        assert!(rom.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));

        let uuid = uuid::Uuid::parse_str(&id.system_uuid).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
        assert_eq!(id.system_uuid, id.system_uuid.to_uppercase());
        assert_eq!(id.system_uuid.len(), 36);
    }

    #[test]
    fn generator_failure_leaves_placeholders() {
        let id = generate("MacPro7,1", &Serials(None), &mut StdRng::seed_from_u64(1));
        assert!(id.is_placeholder());
        assert_eq!(id.mlb, PLACEHOLDER_MLB);
    }

    #[test]
    fn preserved_identity_is_reused_for_the_same_model() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("smbios.json");
        let tools = Serials(Some(("C02ABCDEFGHJ", "C02123456789ABCDE")));
        let first = generate("iMac20,1", &tools, &mut StdRng::seed_from_u64(3));
        save(&file, &first).unwrap();

        let again = resolve(&file, true, "iMac20,1", &tools, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(again, first);
        let other = resolve(&file, true, "MacPro7,1", &tools, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(other.system_product_name, "MacPro7,1");
        let fresh = resolve(&file, false, "iMac20,1", &tools, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_ne!(fresh.system_uuid, first.system_uuid);
    }

    #[test]
    fn seed_follows_the_identity() {
        let mut rng = StdRng::seed_from_u64(11);
        let tools = Serials(Some(("C02ABCDEFGHJ", "C02123456789ABCDE")));
        let a = generate("iMac20,2", &tools, &mut rng);
        let b = generate("iMac20,2", &tools, &mut rng);
        assert_eq!(a.seed(), a.clone().seed());
        assert_ne!(a.seed(), b.seed());

        let mut broken = a.clone();
        broken.system_uuid = "not a uuid".into();
        assert_eq!(broken.seed(), broken.clone().seed());
        assert_ne!(broken.seed(), a.seed());
    }
}
