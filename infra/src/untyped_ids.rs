use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use data_encoding::BASE64URL_NOPAD;
use err_derive::Error;
use rand::distributions::{Distribution, Standard};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use siphasher::sip::SipHasher24;

use crate::ids::Id;

/// An identifier without an entity prefix. The first half is a nanosecond
/// timestamp (for generated ids), the second is random.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UntypedId {
    stamp: u64,
    random: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error(display = "Invalid prefix")]
    InvalidPrefix,
    #[error(display = "Unparseable Id")]
    Unparseable,
}

#[derive(Debug, Default)]
pub struct IdGen {
    last: Mutex<u64>,
}

impl UntypedId {
    pub fn hashed<H: Hash + ?Sized>(entity: &H) -> Self {
        let mut halves = [0u64; 2];
        for (i, half) in halves.iter_mut().enumerate() {
            let mut h = SipHasher24::new_with_keys(0, i as u64);
            entity.hash(&mut h);
            *half = h.finish();
        }
        UntypedId {
            stamp: halves[0],
            random: halves[1],
        }
    }

    pub fn typed<T>(self) -> Id<T> {
        Id::from_untyped(self)
    }

    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.stamp)
    }

    pub fn random(&self) -> u64 {
        self.random
    }

    pub(crate) fn to_bytes(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.stamp.to_be_bytes());
        buf[8..].copy_from_slice(&self.random.to_be_bytes());
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdParseError> {
        if bytes.len() != 16 {
            return Err(IdParseError::Unparseable);
        }
        let mut stamp = [0u8; 8];
        let mut random = [0u8; 8];
        stamp.copy_from_slice(&bytes[..8]);
        random.copy_from_slice(&bytes[8..]);
        Ok(UntypedId {
            stamp: u64::from_be_bytes(stamp),
            random: u64::from_be_bytes(random),
        })
    }
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps are strictly increasing per generator, even if the wall clock
    /// stalls or steps backwards.
    pub fn untyped(&self) -> UntypedId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = std::cmp::max(now, *last + 1);
        *last = stamp;
        UntypedId {
            stamp,
            random: rand::random(),
        }
    }

    pub fn generate<T>(&self) -> Id<T> {
        self.untyped().typed()
    }
}

impl Distribution<UntypedId> for Standard {
    fn sample<R: ?Sized + rand::Rng>(&self, rng: &mut R) -> UntypedId {
        UntypedId {
            stamp: rng.gen(),
            random: rng.gen(),
        }
    }
}

impl fmt::Display for UntypedId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", BASE64URL_NOPAD.encode(&self.to_bytes()))
    }
}

impl fmt::Debug for UntypedId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("UntypedId")
            .field("stamp", &format_args!("{:016x}", self.stamp))
            .field("random", &format_args!("{:016x}", self.random))
            .finish()
    }
}

impl std::str::FromStr for UntypedId {
    type Err = IdParseError;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64URL_NOPAD
            .decode(src.as_bytes())
            .map_err(|_| IdParseError::Unparseable)?;
        UntypedId::from_bytes(&bytes)
    }
}

impl Serialize for UntypedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UntypedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
