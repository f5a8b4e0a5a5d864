//! Pack unpacking
//!
//! Records are parsed up front, then resolved into full objects. Base records
//! resolve immediately; a delta resolves once its base has, walking the chain
//! with an explicit stack and memoizing every resolved payload, so a base shared
//! by many deltas is rebuilt once. REF_DELTA bases may come from the store, from
//! an earlier record or from a later one. A delta whose base id is not known yet
//! waits under that id and is resumed as soon as some record produces it; any
//! delta still waiting once every record has been visited fails the unpack.

use crate::areas::database::ObjectStore;
use crate::artifacts::core::digest;
use crate::artifacts::objects::object::{decode_frame, encode_frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::delta::apply_delta;
use crate::artifacts::pack::record::{PackHeader, PackRecord, RecordKind};
use crate::artifacts::pack::{PACK_HEADER_LENGTH, PACK_TRAILER_LENGTH};
use crate::errors::{BitError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// Outcome of unpacking one pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub object_count: usize,
    pub delta_count: usize,
    /// Ids of all stored objects, in pack order
    pub object_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
struct Resolved {
    object_type: ObjectType,
    content: Bytes,
    oid: ObjectId,
}

/// Where a delta's base content comes from
enum Base {
    Ready(ObjectType, Bytes),
    /// Another record of this pack, not resolved yet
    Record(usize),
    /// A REF_DELTA base id nobody has produced so far
    Unknown(ObjectId),
}

pub struct PackReader<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ObjectStore + ?Sized> PackReader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        PackReader { store }
    }

    /// Verify, resolve and store every object of `pack`
    ///
    /// Objects are written as they resolve; on error, those already written stay.
    pub fn unpack(&self, pack: &[u8]) -> Result<PackSummary> {
        let records = Self::parse_records(pack)?;
        let delta_count = records.iter().filter(|r| r.kind.is_delta()).count();
        let by_offset = records
            .iter()
            .enumerate()
            .map(|(index, record)| (record.offset, index))
            .collect::<HashMap<_, _>>();

        let mut resolution = Resolution {
            store: self.store,
            records: &records,
            by_offset,
            resolved: vec![None; records.len()],
            by_id: HashMap::new(),
            stored_bases: HashMap::new(),
            waiting: HashMap::new(),
            woken: Vec::new(),
        };

        for index in 0..records.len() {
            resolution.settle(index)?;
        }

        if let Some((missing, _)) = resolution
            .waiting
            .iter()
            .min_by_key(|(_, waiters)| waiters.iter().min().copied())
        {
            return Err(BitError::CorruptPack(format!(
                "delta base {missing} is neither in the pack nor in the store"
            )));
        }

        let object_ids = resolution
            .resolved
            .into_iter()
            .flatten()
            .map(|resolved| resolved.oid)
            .collect::<Vec<_>>();

        tracing::debug!(
            objects = object_ids.len(),
            deltas = delta_count,
            "unpacked pack"
        );

        Ok(PackSummary {
            object_count: object_ids.len(),
            delta_count,
            object_ids,
        })
    }

    /// Check the trailer, then split the pack into records
    fn parse_records(pack: &[u8]) -> Result<Vec<PackRecord>> {
        if pack.len() < PACK_HEADER_LENGTH + PACK_TRAILER_LENGTH {
            return Err(BitError::CorruptPack(format!(
                "pack of {} bytes is too short",
                pack.len()
            )));
        }

        let records_end = pack.len() - PACK_TRAILER_LENGTH;
        let (content, trailer) = pack.split_at(records_end);
        if digest(content).as_bytes() != trailer {
            return Err(BitError::CorruptPack("pack checksum mismatch".to_string()));
        }

        let header = PackHeader::parse(pack)?;
        tracing::trace!(version = header.version, count = header.object_count, "parsing pack");

        // the count is untrusted; the reservation grows with what actually parses
        let mut records = Vec::with_capacity((header.object_count as usize).min(1024));
        let mut offset = PACK_HEADER_LENGTH;
        for _ in 0..header.object_count {
            if offset >= records_end {
                return Err(BitError::CorruptPack(format!(
                    "pack ends after {} of {} records",
                    records.len(),
                    header.object_count
                )));
            }
            let (record, next) = PackRecord::parse(pack, offset, records_end)?;
            records.push(record);
            offset = next;
        }

        if offset != records_end {
            return Err(BitError::CorruptPack(format!(
                "{} unexpected bytes after the last record",
                records_end - offset
            )));
        }

        Ok(records)
    }
}

struct Resolution<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    records: &'a [PackRecord],
    by_offset: HashMap<usize, usize>,
    resolved: Vec<Option<Resolved>>,
    by_id: HashMap<ObjectId, usize>,
    /// REF_DELTA bases already loaded from the store
    stored_bases: HashMap<ObjectId, (ObjectType, Bytes)>,
    /// Records blocked on a REF_DELTA base id nobody has produced yet
    waiting: HashMap<ObjectId, Vec<usize>>,
    /// Waiters released by the objects resolved since the last drain
    woken: Vec<usize>,
}

impl<S: ObjectStore + ?Sized> Resolution<'_, S> {
    /// Resolve record `index`, then every waiter its resolution unblocks
    fn settle(&mut self, index: usize) -> Result<()> {
        let mut queue = vec![index];

        while let Some(current) = queue.pop() {
            if let Some(missing) = self.resolve(current)? {
                self.waiting.entry(missing).or_default().push(current);
            }
            queue.append(&mut self.woken);
        }

        Ok(())
    }

    /// Resolve record `index` and every unresolved base below it
    ///
    /// Returns the id of a REF_DELTA base that is not available yet, if any.
    fn resolve(&mut self, index: usize) -> Result<Option<ObjectId>> {
        // OFS_DELTA bases always sit at smaller offsets and REF_DELTA bases are
        // only followed once resolved, so this walk cannot loop
        let records = self.records;
        let mut stack = vec![index];

        while let Some(&current) = stack.last() {
            if self.resolved[current].is_some() {
                stack.pop();
                continue;
            }

            let record = &records[current];
            let (object_type, content) = match &record.kind {
                RecordKind::Base(object_type) => (*object_type, record.data.clone()),
                kind => match self.locate_base(kind, record.offset)? {
                    Base::Ready(object_type, base) => {
                        (object_type, apply_delta(&base, &record.data)?)
                    }
                    Base::Record(base_index) => {
                        stack.push(base_index);
                        continue;
                    }
                    Base::Unknown(missing) => return Ok(Some(missing)),
                },
            };

            let oid = self.store.write(&encode_frame(object_type, &content))?;
            tracing::trace!(offset = record.offset, %oid, %object_type, "resolved record");

            self.by_id.entry(oid).or_insert(current);
            if let Some(waiters) = self.waiting.remove(&oid) {
                self.woken.extend(waiters);
            }
            self.resolved[current] = Some(Resolved {
                object_type,
                content,
                oid,
            });
            stack.pop();
        }

        Ok(None)
    }

    fn locate_base(&mut self, kind: &RecordKind, offset: usize) -> Result<Base> {
        let base_index = match kind {
            RecordKind::Base(_) => {
                return Err(BitError::CorruptPack(format!(
                    "record at {offset} is not a delta"
                )));
            }
            RecordKind::OfsDelta { base_offset } => {
                *self.by_offset.get(base_offset).ok_or_else(|| {
                    BitError::CorruptPack(format!(
                        "record at {offset} refers to offset {base_offset}, which starts no record"
                    ))
                })?
            }
            RecordKind::RefDelta { base } => match self.by_id.get(base) {
                Some(&index) => index,
                None => return self.stored_base(base),
            },
        };

        Ok(match &self.resolved[base_index] {
            Some(resolved) => Base::Ready(resolved.object_type, resolved.content.clone()),
            None => Base::Record(base_index),
        })
    }

    fn stored_base(&mut self, base: &ObjectId) -> Result<Base> {
        if let Some((object_type, payload)) = self.stored_bases.get(base) {
            return Ok(Base::Ready(*object_type, payload.clone()));
        }
        if !self.store.contains(base) {
            return Ok(Base::Unknown(*base));
        }

        let (object_type, payload) = decode_frame(&self.store.read(base)?)?;
        self.stored_bases
            .insert(*base, (object_type, payload.clone()));
        Ok(Base::Ready(object_type, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::database::Database;
    use crate::artifacts::core::compress;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::object::Packable;
    use crate::artifacts::pack::delta::tests::DeltaBuilder;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    /// Minimal pack writer for building test input
    #[derive(Default)]
    struct PackBuilder {
        records: Vec<u8>,
        count: u32,
    }

    impl PackBuilder {
        fn next_offset(&self) -> usize {
            PACK_HEADER_LENGTH + self.records.len()
        }

        fn push(&mut self, type_tag: u8, size: usize, extra: &[u8], data: &[u8]) -> usize {
            let offset = self.next_offset();
            let mut byte = (type_tag << 4) | (size & 0x0f) as u8;
            let mut rest = size >> 4;
            while rest > 0 {
                self.records.push(byte | 0x80);
                byte = (rest & 0x7f) as u8;
                rest >>= 7;
            }
            self.records.push(byte);
            self.records.extend_from_slice(extra);
            self.records
                .extend_from_slice(&compress(data).expect("compression succeeds"));
            self.count += 1;
            offset
        }

        fn base(&mut self, object_type: ObjectType, content: &[u8]) -> usize {
            let tag = match object_type {
                ObjectType::Commit => 1,
                ObjectType::Tree => 2,
                ObjectType::Blob => 3,
                ObjectType::Tag => 4,
            };
            self.push(tag, content.len(), &[], content)
        }

        fn ofs_delta(&mut self, base_offset: usize, delta: &[u8]) -> usize {
            let mut distance = self.next_offset() - base_offset;
            let mut encoded = vec![(distance & 0x7f) as u8];
            distance >>= 7;
            while distance > 0 {
                distance -= 1;
                encoded.insert(0, 0x80 | (distance & 0x7f) as u8);
                distance >>= 7;
            }
            self.push(6, delta.len(), &encoded, delta)
        }

        fn ref_delta(&mut self, base: &ObjectId, delta: &[u8]) -> usize {
            self.push(7, delta.len(), base.as_bytes(), delta)
        }

        fn build(&self) -> Vec<u8> {
            let mut pack = b"PACK\x00\x00\x00\x02".to_vec();
            pack.extend_from_slice(&self.count.to_be_bytes());
            pack.extend_from_slice(&self.records);
            let trailer = digest(&pack);
            pack.extend_from_slice(trailer.as_bytes());
            pack
        }
    }

    #[fixture]
    fn database() -> (assert_fs::TempDir, Database) {
        let dir = assert_fs::TempDir::new().expect("Failed to create temp dir");
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    fn blob_id(content: &[u8]) -> ObjectId {
        Blob::new(content.to_vec())
            .serialize()
            .map(|frame| digest(&frame))
            .expect("blob serializes")
    }

    #[rstest]
    fn base_objects_are_stored(database: (assert_fs::TempDir, Database)) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let mut builder = PackBuilder::default();
        builder.base(ObjectType::Blob, b"hello\n");
        builder.base(ObjectType::Tag, b"object ce01\ntype blob\n");

        let summary = PackReader::new(&database).unpack(&builder.build())?;

        assert_eq!(summary.object_count, 2);
        assert_eq!(summary.delta_count, 0);
        assert_eq!(summary.object_ids[0].to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let (object_type, _) = decode_frame(&database.read(&summary.object_ids[1])?)?;
        assert_eq!(object_type, ObjectType::Tag);
        Ok(())
    }

    #[rstest]
    fn delta_chains_resolve_through_both_kinds(
        database: (assert_fs::TempDir, Database),
    ) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let base = b"alpha beta gamma".as_slice();
        let middle = b"alpha BETA gamma".as_slice();
        let target = b"BETA gamma delta".as_slice();

        let first = DeltaBuilder::default()
            .copy(0, 6)
            .insert(b"BETA")
            .copy(10, 6)
            .build(base.len(), middle.len());
        let second = DeltaBuilder::default()
            .copy(6, 10)
            .insert(b" delta")
            .build(middle.len(), target.len());

        let mut builder = PackBuilder::default();
        let base_offset = builder.base(ObjectType::Blob, base);
        builder.ofs_delta(base_offset, &first);
        // delta-of-delta whose base is named by id
        builder.ref_delta(&blob_id(middle), &second);

        let summary = PackReader::new(&database).unpack(&builder.build())?;

        assert_eq!(summary.delta_count, 2);
        assert_eq!(
            summary.object_ids,
            vec![blob_id(base), blob_id(middle), blob_id(target)]
        );
        assert_eq!(
            database.parse_object_as_blob(&blob_id(target))?,
            Some(Blob::new(target.to_vec()))
        );
        Ok(())
    }

    #[rstest]
    fn ref_delta_may_precede_its_base(
        database: (assert_fs::TempDir, Database),
    ) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let base = b"shared base content".as_slice();
        let delta = DeltaBuilder::default()
            .copy(0, 6)
            .insert(b"!")
            .build(base.len(), 7);

        let mut builder = PackBuilder::default();
        builder.ref_delta(&blob_id(base), &delta);
        builder.base(ObjectType::Blob, base);

        let summary = PackReader::new(&database).unpack(&builder.build())?;

        assert_eq!(summary.object_count, 2);
        assert!(database.contains(&blob_id(b"shared!")));
        Ok(())
    }

    #[rstest]
    fn ref_delta_may_use_a_stored_base(
        database: (assert_fs::TempDir, Database),
    ) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let base = b"already here".as_slice();
        database.write(&Blob::new(base.to_vec()).serialize()?)?;
        let delta = DeltaBuilder::default()
            .copy(0, 7)
            .build(base.len(), 7);

        let mut builder = PackBuilder::default();
        builder.ref_delta(&blob_id(base), &delta);

        PackReader::new(&database).unpack(&builder.build())?;

        assert!(database.contains(&blob_id(b"already")));
        Ok(())
    }

    /// `root` followed by `depth` levels, each one `+` longer
    fn appended_levels(root: &[u8], depth: usize) -> Vec<Vec<u8>> {
        let mut levels = vec![root.to_vec()];
        for _ in 0..depth {
            let mut next = levels[levels.len() - 1].clone();
            next.push(b'+');
            levels.push(next);
        }
        levels
    }

    fn append_plus(base: &[u8]) -> Vec<u8> {
        DeltaBuilder::default()
            .copy(0, base.len() as u32)
            .insert(b"+")
            .build(base.len(), base.len() + 1)
    }

    #[rstest]
    fn ref_chain_in_reverse_order_resolves(
        database: (assert_fs::TempDir, Database),
    ) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let levels = appended_levels(b"chain link", 4);

        // deepest delta first, the plain base last
        let mut builder = PackBuilder::default();
        for depth in (1..levels.len()).rev() {
            builder.ref_delta(&blob_id(&levels[depth - 1]), &append_plus(&levels[depth - 1]));
        }
        builder.base(ObjectType::Blob, &levels[0]);

        let summary = PackReader::new(&database).unpack(&builder.build())?;

        assert_eq!(summary.delta_count, 4);
        assert_eq!(
            summary.object_ids,
            levels.iter().rev().map(|level| blob_id(level)).collect::<Vec<_>>()
        );
        assert_eq!(
            database.parse_object_as_blob(&blob_id(b"chain link++++"))?,
            Some(Blob::new(b"chain link++++".to_vec()))
        );
        Ok(())
    }

    /// Counts reads that reach the wrapped store
    struct CountingStore<'d> {
        inner: &'d Database,
        reads: std::cell::Cell<usize>,
    }

    impl ObjectStore for CountingStore<'_> {
        fn write(&self, frame: &[u8]) -> Result<ObjectId> {
            self.inner.write(frame)
        }

        fn read(&self, oid: &ObjectId) -> Result<Bytes> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(oid)
        }

        fn contains(&self, oid: &ObjectId) -> bool {
            self.inner.contains(oid)
        }
    }

    #[rstest]
    fn stored_base_is_read_once_for_many_deltas(
        database: (assert_fs::TempDir, Database),
    ) -> anyhow::Result<()> {
        let (_dir, database) = database;
        let base = b"common ancestor".as_slice();
        database.write(&Blob::new(base.to_vec()).serialize()?)?;

        let mut builder = PackBuilder::default();
        for suffix in [b"1", b"2", b"3"] {
            let delta = DeltaBuilder::default()
                .copy(0, base.len() as u32)
                .insert(suffix)
                .build(base.len(), base.len() + 1);
            builder.ref_delta(&blob_id(base), &delta);
        }
        let store = CountingStore {
            inner: &database,
            reads: std::cell::Cell::new(0),
        };

        let summary = PackReader::new(&store).unpack(&builder.build())?;

        assert_eq!(summary.object_count, 3);
        assert_eq!(store.reads.get(), 1);
        assert!(database.contains(&blob_id(b"common ancestor3")));
        Ok(())
    }

    #[rstest]
    fn missing_ref_base_is_corrupt(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let delta = DeltaBuilder::default().insert(b"x").build(3, 1);
        let mut builder = PackBuilder::default();
        builder.ref_delta(&blob_id(b"nowhere"), &delta);

        assert!(matches!(
            PackReader::new(&database).unpack(&builder.build()),
            Err(BitError::CorruptPack(_))
        ));
    }

    fn sample_pack() -> Vec<u8> {
        let mut builder = PackBuilder::default();
        let base = builder.base(ObjectType::Blob, b"the quick brown fox jumps over the lazy dog");
        builder.ofs_delta(
            base,
            &DeltaBuilder::default().copy(4, 15).insert(b"!").build(43, 16),
        );
        builder.build()
    }

    #[rstest]
    fn truncation_is_detected(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let mut pack = sample_pack();
        pack.pop();

        assert!(matches!(
            PackReader::new(&database).unpack(&pack),
            Err(BitError::CorruptPack(_))
        ));
    }

    #[rstest]
    fn every_flipped_byte_is_detected(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let pack = sample_pack();

        for position in 0..pack.len() {
            let mut corrupted = pack.clone();
            corrupted[position] ^= 0x20;

            assert!(
                matches!(
                    PackReader::new(&database).unpack(&corrupted),
                    Err(BitError::CorruptPack(_))
                ),
                "flip at {position} went unnoticed"
            );
        }
    }

    #[rstest]
    fn count_must_match_records(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let mut builder = PackBuilder::default();
        builder.base(ObjectType::Blob, b"one");
        builder.count = 2;

        assert!(PackReader::new(&database).unpack(&builder.build()).is_err());

        builder.count = 0;
        assert!(PackReader::new(&database).unpack(&builder.build()).is_err());
    }
}
