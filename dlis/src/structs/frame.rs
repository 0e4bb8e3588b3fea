use anyhow::Result;

use crate::structs::rep_code::RepCode;
use crate::structs::value::{ObjectName, Value};
use crate::utils::errors::SchemaError;

pub const DIMENSION: &str = "DIMENSION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: ObjectName,
    pub code: RepCode,
    /// Elements per frame.
    pub dimension: usize,
    pub element_size: usize,
    /// Byte offset within the frame.
    pub offset: usize,
}

impl ChannelInfo {
    /// Bytes per frame. Layouts built by [`FrameLayout::from_channels`]
    /// never overflow here.
    pub fn byte_len(&self) -> usize {
        self.dimension * self.element_size
    }
}

/// Byte layout shared by every frame of one frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub key: ObjectName,
    pub channels: Vec<ChannelInfo>,
    /// Bytes per frame.
    pub len: usize,
}

impl FrameLayout {
    /// Lays channels out back to back in declaration order.
    pub fn from_channels<I>(key: ObjectName, channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ObjectName, RepCode, usize)>,
    {
        let mut offset: usize = 0;
        let mut infos = Vec::new();

        for (name, code, dimension) in channels {
            let Some(element_size) = code.fixed_size() else {
                return Err(SchemaError::VariableWidthChannel {
                    channel: name,
                    code: code.name(),
                }
                .into());
            };

            let Some(next) = dimension
                .checked_mul(element_size)
                .and_then(|len| offset.checked_add(len))
            else {
                return Err(SchemaError::InvalidAttribute {
                    channel: name,
                    label: DIMENSION,
                }
                .into());
            };

            infos.push(ChannelInfo {
                name,
                code,
                dimension,
                element_size,
                offset,
            });
            offset = next;
        }

        Ok(Self {
            key,
            channels: infos,
            len: offset,
        })
    }

    pub fn channel_index(&self, name: &ObjectName) -> Option<usize> {
        self.channels.iter().position(|channel| channel.name == *name)
    }
}

/// One frame handed to a [`FrameSink`]. The data buffer is reused for the
/// next frame and must not be retained.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub number: u32,
    pub layout: &'a FrameLayout,
    pub data: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn channel(&self, index: usize) -> Option<ChannelSample<'a>> {
        let info = self.layout.channels.get(index)?;
        let bytes = self.data.get(info.offset..info.offset + info.byte_len())?;
        Some(ChannelSample { info, bytes })
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelSample<'a>> + 'a {
        let view = *self;
        (0..view.layout.channels.len()).filter_map(move |index| view.channel(index))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelSample<'a> {
    pub info: &'a ChannelInfo,
    pub bytes: &'a [u8],
}

impl ChannelSample<'_> {
    /// Decodes every element of the sample.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.bytes
            .chunks_exact(self.info.element_size)
            .map(|element| Value::decode_fixed(self.info.code, element))
            .collect()
    }
}

/// Receives decoded frames.
pub trait FrameSink {
    fn on_frame(&mut self, key: &ObjectName, frame: &FrameView<'_>);
}

impl<F> FrameSink for F
where
    F: FnMut(&ObjectName, &FrameView<'_>),
{
    fn on_frame(&mut self, key: &ObjectName, frame: &FrameView<'_>) {
        self(key, frame)
    }
}

/// Sink that drops every frame.
pub struct NullSink;

impl FrameSink for NullSink {
    fn on_frame(&mut self, _key: &ObjectName, _frame: &FrameView<'_>) {}
}
