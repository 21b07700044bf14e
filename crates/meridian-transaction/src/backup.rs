// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! The `<id>.txn` backup file a [`crate::Transaction`] forces to disk before
//! draining its writes into the engine:
//!
//! ```text
//! [u32 lockSectionLength]
//! [lockSection = framed collection of LockDescription]
//! [writeSection = framed collection of Write]
//! ```
//!
//! where a "framed collection" is `[u32 count][for each: u32 size][size
//! bytes]`.

use crate::error::TransactionError;
use meridian_core::Write;
use meridian_lock::LockDescriptor;

fn frame(items: impl Iterator<Item = Vec<u8>>, count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend((count as u32).to_be_bytes());
    for bytes in items {
        out.extend((bytes.len() as u32).to_be_bytes());
        out.extend(bytes);
    }
    out
}

pub fn serialize(locks: &[LockDescriptor], writes: &[Write]) -> Vec<u8> {
    let lock_section = frame(locks.iter().map(LockDescriptor::encode), locks.len());
    let write_section = frame(writes.iter().map(Write::encode), writes.len());

    let mut out = Vec::with_capacity(4 + lock_section.len() + write_section.len());
    out.extend((lock_section.len() as u32).to_be_bytes());
    out.extend(lock_section);
    out.extend(write_section);
    out
}

fn corrupt(what: &str) -> TransactionError {
    TransactionError::CorruptBackup(what.to_string())
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, TransactionError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| corrupt("truncated before a length field"))
}

fn decode_lock_section(bytes: &[u8]) -> Result<Vec<LockDescriptor>, TransactionError> {
    let count = read_u32(bytes, 0)? as usize;
    let mut offset = 4;
    let mut locks = Vec::with_capacity(count);
    for _ in 0..count {
        let size = read_u32(bytes, offset)? as usize;
        offset += 4;
        let item_bytes = bytes.get(offset..offset + size).ok_or_else(|| corrupt("truncated lock descriptor"))?;
        let (descriptor, consumed) = LockDescriptor::decode(item_bytes).map_err(|_| corrupt("malformed lock descriptor"))?;
        if consumed != size {
            return Err(corrupt("lock descriptor framing size mismatch"));
        }
        locks.push(descriptor);
        offset += size;
    }
    Ok(locks)
}

fn decode_write_section(bytes: &[u8]) -> Result<Vec<Write>, TransactionError> {
    let count = read_u32(bytes, 0)? as usize;
    let mut offset = 4;
    let mut writes = Vec::with_capacity(count);
    for _ in 0..count {
        let size = read_u32(bytes, offset)? as usize;
        offset += 4;
        let item_bytes = bytes.get(offset..offset + size).ok_or_else(|| corrupt("truncated write record"))?;
        let (write, consumed) = Write::decode(item_bytes).map_err(|_| corrupt("malformed write record"))?;
        if consumed != size {
            return Err(corrupt("write record framing size mismatch"));
        }
        writes.push(write);
        offset += size;
    }
    Ok(writes)
}

pub fn deserialize(bytes: &[u8]) -> Result<(Vec<LockDescriptor>, Vec<Write>), TransactionError> {
    let lock_len = read_u32(bytes, 0)? as usize;
    let lock_bytes = bytes.get(4..4 + lock_len).ok_or_else(|| corrupt("lock section length exceeds file size"))?;
    let locks = decode_lock_section(lock_bytes)?;

    let write_bytes = bytes.get(4 + lock_len..).ok_or_else(|| corrupt("missing write section"))?;
    let writes = decode_write_section(write_bytes)?;

    Ok((locks, writes))
}
