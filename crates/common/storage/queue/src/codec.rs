// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Key and value encoding for persisted queue entries.
//!
//! ## Keys
//!
//! Each record is stored under its logical offset encoded as 8 big-endian
//! bytes, so lexicographic key order equals numeric offset order and a range
//! scan over `[head, tail)` yields records in FIFO order.
//!
//! ## Values
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬─────────────────┐
//! │ Version (1B) │ bincode(OperationInfo)   │   CRC32 (4B)    │
//! │              │ variable                 │   little-endian │
//! └──────────────┴──────────────────────────┴─────────────────┘
//! ```
//!
//! The CRC covers the version byte and the body. A value that fails any check
//! is reported as corruption: a successfully written key always carries a
//! well-formed value.

use crc32fast::Hasher;
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    OperationInfo, Result,
    error::{CorruptedRecordSnafu, EncodeSnafu, MalformedKeySnafu},
};

/// Width of an encoded offset key.
pub const OFFSET_KEY_SIZE: usize = 8;

/// Current value format version.
pub(crate) const RECORD_FORMAT_V1: u8 = 1;

const RECORD_VERSION_SIZE: usize = 1;
const RECORD_CRC_SIZE: usize = 4;

/// Encodes an offset as an order-preserving fixed-width key.
#[inline]
#[must_use]
pub const fn encode_offset(offset: u64) -> [u8; OFFSET_KEY_SIZE] { offset.to_be_bytes() }

/// Decodes a key produced by [`encode_offset`].
pub fn decode_offset(key: &[u8]) -> Result<u64> {
    let bytes: [u8; OFFSET_KEY_SIZE] = key.try_into().ok().context(MalformedKeySnafu {
        expected: OFFSET_KEY_SIZE,
        len:      key.len(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

#[inline]
fn record_crc(version: u8, body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);
    hasher.update(body);
    hasher.finalize()
}

/// Serializes an operation into its on-disk value.
pub fn encode_record(op: &OperationInfo) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(op, bincode::config::standard()).context(
        EncodeSnafu {
            unique_suffix: op.unique_suffix.clone(),
        },
    )?;

    let mut value = Vec::with_capacity(RECORD_VERSION_SIZE + body.len() + RECORD_CRC_SIZE);
    value.push(RECORD_FORMAT_V1);
    value.extend_from_slice(&body);
    value.extend_from_slice(&record_crc(RECORD_FORMAT_V1, &body).to_le_bytes());
    Ok(value)
}

/// Deserializes the value stored at `offset`.
pub fn decode_record(offset: u64, value: &[u8]) -> Result<OperationInfo> {
    ensure!(
        value.len() >= RECORD_VERSION_SIZE + RECORD_CRC_SIZE,
        CorruptedRecordSnafu {
            offset,
            reason: format!("value too short ({} bytes)", value.len()),
        }
    );

    let version = value[0];
    ensure!(
        version == RECORD_FORMAT_V1,
        CorruptedRecordSnafu {
            offset,
            reason: format!("unknown format version {version}"),
        }
    );

    let body_len = value.len() - RECORD_VERSION_SIZE - RECORD_CRC_SIZE;
    let (body, crc_bytes) = value[RECORD_VERSION_SIZE..].split_at(body_len);
    let mut crc_buf = [0u8; RECORD_CRC_SIZE];
    crc_buf.copy_from_slice(crc_bytes);
    let stored_crc = u32::from_le_bytes(crc_buf);
    ensure!(
        record_crc(version, body) == stored_crc,
        CorruptedRecordSnafu {
            offset,
            reason: "checksum mismatch".to_string(),
        }
    );

    let (op, read) =
        bincode::serde::decode_from_slice::<OperationInfo, _>(body, bincode::config::standard())
            .map_err(|e| {
                CorruptedRecordSnafu {
                    offset,
                    reason: e.to_string(),
                }
                .build()
            })?;
    ensure!(
        read == body.len(),
        CorruptedRecordSnafu {
            offset,
            reason: format!("{} trailing bytes", body.len() - read),
        }
    );

    Ok(op)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    #[test_case(0 ; "zero")]
    #[test_case(1 ; "one")]
    #[test_case(1 << 32 ; "two pow 32")]
    #[test_case(u64::MAX ; "max")]
    fn test_offset_round_trip(n: u64) {
        assert_eq!(decode_offset(&encode_offset(n)).unwrap(), n);
    }

    #[test]
    fn test_offset_order_preserved() {
        let values = [0u64, 1, 255, 256, 1 << 32, u64::MAX - 1, u64::MAX];
        for pair in values.windows(2) {
            assert!(encode_offset(pair[0]) < encode_offset(pair[1]));
        }
    }

    #[test]
    fn test_decode_offset_rejects_wrong_width() {
        let err = decode_offset(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, QueueError::MalformedKey { len: 4, .. }));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_record_round_trip() {
        let op = OperationInfo::new("suffix-1", "ns", b"{\"op\":\"create\"}".to_vec());
        let value = encode_record(&op).unwrap();
        assert_eq!(value[0], RECORD_FORMAT_V1);
        assert_eq!(decode_record(7, &value).unwrap(), op);
    }

    #[test]
    fn test_record_checksum_mismatch() {
        let op = OperationInfo::new("suffix-1", "ns", b"data".to_vec());
        let mut value = encode_record(&op).unwrap();
        value[2] ^= 0xFF;

        let err = decode_record(3, &value).unwrap_err();
        assert!(matches!(err, QueueError::CorruptedRecord { offset: 3, .. }));
    }

    #[test_case(&[] ; "empty")]
    #[test_case(&[1, 0, 0] ; "truncated")]
    #[test_case(&[9, 0, 0, 0, 0, 0] ; "unknown version")]
    fn test_record_rejects_garbage(value: &[u8]) {
        assert!(decode_record(0, value).unwrap_err().is_corruption());
    }
}
