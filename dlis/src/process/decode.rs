use std::collections::HashMap;
use std::io::Read;

use anyhow::Result;

use crate::process::read::RecordReader;
use crate::structs::frame::{DIMENSION, FrameLayout, FrameSink, FrameView};
use crate::structs::model::{Model, ObjectId, SetId};
use crate::structs::rep_code::RepCode;
use crate::structs::value::{ObjectName, ReadBytes, read_uvari};
use crate::utils::arena::{Id, Pool};
use crate::utils::errors::{ArenaError, SchemaError};

pub const FRAME_SET: &str = "FRAME";
pub const CHANNEL_SET: &str = "CHANNEL";
pub const CHANNELS: &str = "CHANNELS";
pub const REPRESENTATION_CODE: &str = "REPRESENTATION-CODE";

/// Frame data records are read into the frame buffer in steps of this many
/// bytes, so a layout larger than the record fails before it is allocated.
const FRAME_READ_STEP: usize = 64 * 1024;

/// Frame types are named per logical file: the same name under another
/// file header is another frame type.
type FrameKey = (Option<SetId>, ObjectName);

/// Demultiplexes frame data records using layouts resolved from the
/// FRAME and CHANNEL sets of the object model.
///
/// Layouts are built on first use and cached by logical file and frame
/// name. Frame types whose layout could not be resolved are remembered so
/// their records can be skipped without another lookup.
pub struct FrameDecoder {
    layouts: Pool<FrameLayout>,
    index: HashMap<FrameKey, Id<FrameLayout>>,
    unresolved: HashMap<FrameKey, usize>,
    buffer: Vec<u8>,
    frames: u64,
}

impl FrameDecoder {
    pub fn with_capacity(layouts: usize) -> Result<Self> {
        Ok(Self {
            layouts: Pool::with_capacity(layouts)?,
            index: HashMap::new(),
            unresolved: HashMap::new(),
            buffer: Vec::new(),
            frames: 0,
        })
    }

    /// Returns the cached layout for `key` in the current logical file,
    /// building it on first use.
    pub fn resolve(&mut self, model: &Model, key: &ObjectName) -> Result<Id<FrameLayout>> {
        let root = model.current_root();
        if let Some(&id) = self.index.get(&(root, key.clone())) {
            return Ok(id);
        }

        let layout = build_layout(model, root, key)?;
        log::debug!(
            "Frame {key}: {} channels, {} bytes per frame",
            layout.channels.len(),
            layout.len
        );

        let id = self.layouts.alloc(layout);
        self.index.insert((root, key.clone()), id);
        Ok(id)
    }

    /// Counts a skipped record of an unresolved frame type. Returns true the
    /// first time the type is seen in its logical file.
    pub fn mark_unresolved(&mut self, root: Option<SetId>, key: &ObjectName) -> bool {
        let skipped = self.unresolved.entry((root, key.clone())).or_insert(0);
        *skipped += 1;
        *skipped == 1
    }

    pub fn is_unresolved(&self, root: Option<SetId>, key: &ObjectName) -> bool {
        self.unresolved.contains_key(&(root, key.clone()))
    }

    /// Reads every frame in the rest of the current record and hands each
    /// one to `sink`.
    pub fn read_frames<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        id: Id<FrameLayout>,
        sink: &mut dyn FrameSink,
    ) -> Result<u64> {
        let layout = self.layouts.get(id);

        let mut frames = 0;
        while !reader.at_record_end() {
            let number = read_uvari(reader)?;
            read_frame(reader, &mut self.buffer, layout.len)?;
            frames += 1;

            let view = FrameView {
                number,
                layout,
                data: &self.buffer,
            };
            sink.on_frame(&layout.key, &view);
        }

        self.frames += frames;
        Ok(frames)
    }

    /// Layout of `key` as resolved in the logical file rooted at `root`.
    pub fn layout(&self, root: Option<SetId>, key: &ObjectName) -> Option<&FrameLayout> {
        self.index
            .get(&(root, key.clone()))
            .map(|&id| self.layouts.get(id))
    }

    pub fn layouts(&self) -> impl Iterator<Item = &FrameLayout> {
        self.layouts.iter().map(|(_, layout)| layout)
    }

    /// Frame types that failed to resolve, with their skipped record counts.
    pub fn unresolved(&self) -> impl Iterator<Item = (&ObjectName, usize)> {
        self.unresolved.iter().map(|((_, key), &count)| (key, count))
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn release(&mut self) {
        self.layouts.release_all();
        self.index.clear();
        self.unresolved.clear();
        self.buffer = Vec::new();
        self.frames = 0;
    }
}

/// Fills `buffer` with the next `len` bytes of the record. The buffer only
/// grows as far as the record actually reaches.
fn read_frame<R: Read>(reader: &mut RecordReader<R>, buffer: &mut Vec<u8>, len: usize) -> Result<()> {
    if buffer.len() > len {
        buffer.truncate(len);
    }

    let mut filled = 0;
    while filled < len {
        let end = len.min(filled + FRAME_READ_STEP);
        if buffer.len() < end {
            buffer
                .try_reserve(end - buffer.len())
                .map_err(|_| ArenaError::FrameBuffer { len })?;
            buffer.resize(end, 0);
        }
        reader.read_into(&mut buffer[filled..end])?;
        filled = end;
    }

    Ok(())
}

/// Builds the byte layout of frame `key` from the FRAME and CHANNEL sets in
/// scope of `root`.
pub fn build_layout(model: &Model, root: Option<SetId>, key: &ObjectName) -> Result<FrameLayout> {
    model
        .find_subset(root, FRAME_SET)
        .ok_or(SchemaError::MissingSet(FRAME_SET))?;
    model
        .find_subset(root, CHANNEL_SET)
        .ok_or(SchemaError::MissingSet(CHANNEL_SET))?;

    let frame = model
        .find_typed_object(root, FRAME_SET, key)
        .ok_or_else(|| SchemaError::MissingFrame(key.clone()))?;
    let channels = model
        .find_attribute(frame, CHANNELS)
        .ok_or_else(|| SchemaError::MissingAttribute {
            object: key.clone(),
            label: CHANNELS,
        })?;

    let mut entries = Vec::new();
    for value in model.values(channels) {
        let name = value
            .as_object_name()
            .ok_or_else(|| SchemaError::InvalidChannelReference(key.clone()))?;
        let channel = model
            .find_typed_object(root, CHANNEL_SET, name)
            .ok_or_else(|| SchemaError::MissingChannel(name.clone()))?;

        entries.push((
            name.clone(),
            channel_code(model, channel, name)?,
            channel_dimension(model, channel, name)?,
        ));
    }

    FrameLayout::from_channels(key.clone(), entries)
}

fn channel_code(model: &Model, channel: ObjectId, name: &ObjectName) -> Result<RepCode> {
    let attribute = model
        .find_attribute(channel, REPRESENTATION_CODE)
        .ok_or_else(|| SchemaError::MissingAttribute {
            object: name.clone(),
            label: REPRESENTATION_CODE,
        })?;

    let code = model
        .attribute_int(attribute)
        .and_then(|raw| u8::try_from(raw).ok())
        .and_then(RepCode::from_u8)
        .ok_or_else(|| SchemaError::InvalidAttribute {
            channel: name.clone(),
            label: REPRESENTATION_CODE,
        })?;

    Ok(code)
}

fn channel_dimension(model: &Model, channel: ObjectId, name: &ObjectName) -> Result<usize> {
    let attribute = model
        .find_attribute(channel, DIMENSION)
        .ok_or_else(|| SchemaError::MissingAttribute {
            object: name.clone(),
            label: DIMENSION,
        })?;

    let invalid = || SchemaError::InvalidAttribute {
        channel: name.clone(),
        label: DIMENSION,
    };

    let mut dimension: usize = 1;
    for value in model.values(attribute) {
        let extent = value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(invalid)?;
        dimension = dimension.checked_mul(extent).ok_or_else(invalid)?;
    }

    Ok(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::parse::Parser;
    use crate::structs::model::PoolHints;
    use crate::structs::segment::{CHANNL, FRAME};
    use crate::utils::errors::{ErrorClass, error_class};
    use crate::utils::testing::{Attr, Eflr, channel_eflr, frame_eflr, name, obnames};

    fn model_from(records: &[(u8, Vec<u8>)]) -> Model {
        let mut model = Model::with_hints(&PoolHints::default()).unwrap();
        let mut parser = Parser::default();
        for (record_type, body) in records {
            parser.begin_record(*record_type);
            let mut reader = body.as_slice();
            while !reader.is_empty() {
                parser.parse_component(&mut reader, &mut model).unwrap();
            }
        }
        model
    }

    #[test]
    fn layout_from_schema() {
        let model = model_from(&[(CHANNL, channel_eflr()), (FRAME, frame_eflr())]);
        let layout = build_layout(&model, None, &name("MAIN")).unwrap();

        let summary: Vec<_> = layout
            .channels
            .iter()
            .map(|c| (c.name.identifier.as_str(), c.dimension, c.element_size, c.offset))
            .collect();
        assert_eq!(
            summary,
            [("TDEP", 1, 4, 0), ("ACC", 3, 4, 4), ("WAVE", 2, 8, 16)]
        );
        assert_eq!(layout.len, 32);
    }

    #[test]
    fn missing_schema_parts() {
        let model = model_from(&[(CHANNL, channel_eflr())]);
        let err = build_layout(&model, None, &name("MAIN")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::MissingSet("FRAME"))
        ));
        assert_eq!(error_class(&err), ErrorClass::Schema);

        let model = model_from(&[(CHANNL, channel_eflr()), (FRAME, frame_eflr())]);
        let err = build_layout(&model, None, &name("OTHER")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::MissingFrame(_))
        ));

        let frame = Eflr::new()
            .set("FRAME", None)
            .attribute(Attr::column("CHANNELS", RepCode::Obname))
            .object(&name("MAIN"))
            .attribute(Attr {
                count: Some(2),
                ..Attr::value(obnames(&[name("TDEP"), name("GHOST")]))
            })
            .bytes();
        let model = model_from(&[(CHANNL, channel_eflr()), (FRAME, frame)]);
        let err = build_layout(&model, None, &name("MAIN")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::MissingChannel(missing)) if missing.identifier == "GHOST"
        ));
    }

    #[test]
    fn channels_may_span_several_sets() {
        let extra = Eflr::new()
            .set("CHANNEL", Some("1"))
            .attribute(Attr::column("REPRESENTATION-CODE", RepCode::Ushort))
            .attribute(Attr::column("DIMENSION", RepCode::Uvari))
            .object(&name("EXTRA"))
            .attribute(Attr::value(vec![RepCode::Fdoubl as u8]))
            .attribute(Attr {
                count: Some(2),
                ..Attr::value(vec![2, 3])
            })
            .bytes();
        let frame = Eflr::new()
            .set("FRAME", None)
            .attribute(Attr::column("CHANNELS", RepCode::Obname))
            .object(&name("MAIN"))
            .attribute(Attr {
                count: Some(2),
                ..Attr::value(obnames(&[name("TDEP"), name("EXTRA")]))
            })
            .bytes();

        let model = model_from(&[(CHANNL, channel_eflr()), (CHANNL, extra), (FRAME, frame)]);
        let layout = build_layout(&model, None, &name("MAIN")).unwrap();
        assert_eq!(layout.channels[1].dimension, 6);
        assert_eq!(layout.channels[1].offset, 4);
        assert_eq!(layout.len, 4 + 6 * 8);
    }
}
