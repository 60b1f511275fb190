//! Checkerboard
//!
//! A tiled image source. Channel data is computed one tile at a time, with
//! the tile and channel chosen by context variables, so each tile of each
//! channel is hashed and cached independently while the channel names are
//! shared by all of them.

use std::sync::Arc;

use log::trace;
use plug_graph::{
    keys, ComputeContext, ComputeNode, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Width and height of a tile, in pixels
pub const TILE_SIZE: i32 = 8;

const CHANNELS: [&str; 4] = ["R", "G", "B", "A"];

/// Checkerboard
///
/// # Plugs
/// - `colorA`, `colorB` (color4f, in)
/// - `size` (v2f, in) - size of one square in pixels
/// - `channelNames` (string vector, out)
/// - `channelData` (float vector, out) - one channel of one tile, row-major
///
/// # Context
/// - `image:tileOrigin` (default `[0, 0]`)
/// - `image:channelName` (default `"R"`)
pub struct Checkerboard;

impl Checkerboard {
    pub const PLUG_COLOR_A: &'static str = "colorA";
    pub const PLUG_COLOR_B: &'static str = "colorB";
    pub const PLUG_SIZE: &'static str = "size";
    pub const PLUG_CHANNEL_NAMES: &'static str = "channelNames";
    pub const PLUG_CHANNEL_DATA: &'static str = "channelData";
}

impl NodeDescriptor for Checkerboard {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &Checkerboard,
            NodeCategory::Source,
            "Checkerboard",
            "Generates a two-colour checkerboard, tile by tile",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "Checkerboard",
    descriptor: Checkerboard::descriptor,
    factory: || Arc::new(Checkerboard),
});

impl ComputeNode for Checkerboard {
    fn type_name(&self) -> &str {
        "Checkerboard"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_COLOR_A, PlugType::Color4f).with_default([1.0f32, 1.0, 1.0, 1.0]),
            PlugDefinition::input(Self::PLUG_COLOR_B, PlugType::Color4f).with_default([0.0f32, 0.0, 0.0, 1.0]),
            PlugDefinition::input(Self::PLUG_SIZE, PlugType::V2f).with_default([64.0f32, 64.0]),
            PlugDefinition::output(Self::PLUG_CHANNEL_NAMES, PlugType::StringVector),
            PlugDefinition::output(Self::PLUG_CHANNEL_DATA, PlugType::FloatVector),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_COLOR_A | Self::PLUG_COLOR_B | Self::PLUG_SIZE => {
                vec![Self::PLUG_CHANNEL_DATA.to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn hash(&self, output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        if output == Self::PLUG_CHANNEL_NAMES {
            return Ok(());
        }
        ctx.append_plug_hash(Self::PLUG_COLOR_A, h)?;
        ctx.append_plug_hash(Self::PLUG_COLOR_B, h)?;
        ctx.append_plug_hash(Self::PLUG_SIZE, h)?;
        ctx.append_context_variable(keys::TILE_ORIGIN, h);
        ctx.append_context_variable(keys::CHANNEL_NAME, h);
        Ok(())
    }

    fn compute(&self, output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        if output == Self::PLUG_CHANNEL_NAMES {
            return Ok(PlugValue::StringVector(CHANNELS.iter().map(|c| c.to_string()).collect()));
        }

        let context = ctx.context();
        let origin: [i32; 2] = context.get_or(keys::TILE_ORIGIN, [0, 0])?;
        let channel: String = context.get_or(keys::CHANNEL_NAME, "R".to_string())?;
        let index = CHANNELS
            .iter()
            .position(|c| *c == channel)
            .ok_or_else(|| ctx.error(format!("unknown channel '{}'", channel)))?;

        let color_a = ctx.get::<[f32; 4]>(Self::PLUG_COLOR_A)?;
        let color_b = ctx.get::<[f32; 4]>(Self::PLUG_COLOR_B)?;
        let size = ctx.get::<[f32; 2]>(Self::PLUG_SIZE)?;
        if size[0] <= 0.0 || size[1] <= 0.0 {
            return Err(ctx.error("size must be positive"));
        }

        trace!("Checkerboard tile {:?}, channel {}", origin, channel);
        let mut data = Vec::with_capacity((TILE_SIZE * TILE_SIZE) as usize);
        for y in origin[1]..origin[1] + TILE_SIZE {
            ctx.check_cancelled()?;
            let row = (y as f32 / size[1]).floor() as i64;
            for x in origin[0]..origin[0] + TILE_SIZE {
                let column = (x as f32 / size[0]).floor() as i64;
                let color = if (row + column).rem_euclid(2) == 0 { color_a } else { color_b };
                data.push(color[index]);
            }
        }
        Ok(PlugValue::FloatVector(data))
    }
}
