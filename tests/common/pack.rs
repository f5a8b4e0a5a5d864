use bitclone::artifacts::core::{compress, digest};
use bitclone::artifacts::objects::object::encode_frame;
use bitclone::artifacts::objects::object_type::ObjectType;
use sha1::{Digest, Sha1};

const OBJ_COMMIT: u8 = 1;
const OBJ_TREE: u8 = 2;
const OBJ_BLOB: u8 = 3;
const OBJ_OFS_DELTA: u8 = 6;

/// Hex id of an object with the given payload
pub fn object_id(kind: ObjectType, payload: &[u8]) -> String {
    digest(&encode_frame(kind, payload)).to_hex()
}

pub fn tree_payload(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (mode, name, oid) in entries {
        payload.extend_from_slice(format!("{mode} {name}\0").as_bytes());
        payload.extend(hex::decode(oid).expect("hex oid"));
    }
    payload
}

pub fn commit_payload(tree: &str, message: &str) -> Vec<u8> {
    format!(
        "tree {tree}\n\
         author Fixture Author <fixture@example.com> 1700000000 +0000\n\
         committer Fixture Author <fixture@example.com> 1700000000 +0000\n\
         \n\
         {message}"
    )
    .into_bytes()
}

/// Delta turning `base` into `base + suffix`
pub fn append_delta(base: &[u8], suffix: &[u8]) -> Vec<u8> {
    assert!(!base.is_empty() && base.len() < 0x10000);

    let mut delta = varint(base.len());
    delta.extend(varint(base.len() + suffix.len()));

    // copy from offset 0: no offset bytes, up to two size bytes
    let size = base.len();
    let mut copy = vec![0x80u8];
    for (shift, flag) in [(0, 0x10u8), (8, 0x20u8)] {
        let byte = (size >> shift) as u8;
        if byte != 0 {
            copy[0] |= flag;
            copy.push(byte);
        }
    }
    delta.extend(copy);

    for chunk in suffix.chunks(0x7f) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }
    delta
}

fn varint(mut value: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

/// Synthetic version 2 pack
#[derive(Debug, Default)]
pub struct PackBuilder {
    records: Vec<u8>,
    offsets: Vec<usize>,
}

impl PackBuilder {
    pub fn commit(self, payload: &[u8]) -> Self {
        self.record(OBJ_COMMIT, payload, &[])
    }

    pub fn tree(self, payload: &[u8]) -> Self {
        self.record(OBJ_TREE, payload, &[])
    }

    pub fn blob(self, payload: &[u8]) -> Self {
        self.record(OBJ_BLOB, payload, &[])
    }

    /// Delta against the record added `base_index`-th
    pub fn ofs_delta(self, base_index: usize, delta: &[u8]) -> Self {
        let offset = HEADER_LENGTH + self.records.len();
        let distance = offset - self.offsets[base_index];
        self.record(OBJ_OFS_DELTA, delta, &offset_encoding(distance))
    }

    pub fn build(self) -> Vec<u8> {
        let mut pack = b"PACK".to_vec();
        pack.extend(2u32.to_be_bytes());
        pack.extend((self.offsets.len() as u32).to_be_bytes());
        pack.extend(self.records);

        let trailer = Sha1::digest(&pack);
        pack.extend_from_slice(&trailer);
        pack
    }

    fn record(mut self, kind: u8, payload: &[u8], extra: &[u8]) -> Self {
        self.offsets.push(HEADER_LENGTH + self.records.len());

        let mut size = payload.len();
        let mut header = vec![(kind << 4) | (size & 0x0f) as u8];
        size >>= 4;
        while size != 0 {
            if let Some(last) = header.last_mut() {
                *last |= 0x80;
            }
            header.push((size & 0x7f) as u8);
            size >>= 7;
        }

        self.records.extend(header);
        self.records.extend_from_slice(extra);
        self.records
            .extend_from_slice(&compress(payload).expect("compress record"));
        self
    }
}

const HEADER_LENGTH: usize = 12;

fn offset_encoding(mut distance: usize) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        bytes.insert(0, 0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes
}
