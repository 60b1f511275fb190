//! Grade
//!
//! Adjusts the saturation of a colour. Disabled or neutral grades pass
//! their input straight through, sharing its hash and cache entry.

use std::sync::Arc;

use plug_graph::{
    ComputeContext, ComputeNode, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata, PlugDefinition,
    PlugType, PlugValue, Result,
};

/// Rec. 709 luminance weights
const LUMINANCE: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Grade
///
/// # Plugs
/// - `enabled` (bool, in, default true)
/// - `in` (color4f, in)
/// - `saturation` (float, in, default 1)
/// - `out` (color4f, out) - alpha is never modified
pub struct Grade;

impl Grade {
    pub const PLUG_ENABLED: &'static str = "enabled";
    pub const PLUG_IN: &'static str = "in";
    pub const PLUG_SATURATION: &'static str = "saturation";
    pub const PLUG_OUT: &'static str = "out";
}

impl NodeDescriptor for Grade {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &Grade,
            NodeCategory::Processing,
            "Grade",
            "Adjusts colour saturation",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "Grade",
    descriptor: Grade::descriptor,
    factory: || Arc::new(Grade),
});

fn saturate(color: [f32; 4], saturation: f32) -> [f32; 4] {
    let luminance: f32 = color.iter().zip(LUMINANCE).map(|(c, w)| c * w).sum();
    let mut result = color;
    for channel in result.iter_mut().take(3) {
        *channel = luminance + (*channel - luminance) * saturation;
    }
    result
}

impl ComputeNode for Grade {
    fn type_name(&self) -> &str {
        "Grade"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_ENABLED, PlugType::Bool).with_default(true),
            PlugDefinition::input(Self::PLUG_IN, PlugType::Color4f),
            PlugDefinition::input(Self::PLUG_SATURATION, PlugType::Float).with_default(1.0),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Color4f),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_ENABLED | Self::PLUG_IN | Self::PLUG_SATURATION => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    fn pass_through(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<Option<String>> {
        let enabled = ctx.get::<bool>(Self::PLUG_ENABLED)?;
        let saturation = ctx.get::<f64>(Self::PLUG_SATURATION)?;
        Ok((!enabled || saturation == 1.0).then(|| Self::PLUG_IN.to_string()))
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(Self::PLUG_IN, h)?;
        ctx.append_plug_hash(Self::PLUG_SATURATION, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let color = ctx.get::<[f32; 4]>(Self::PLUG_IN)?;
        let saturation = ctx.get::<f64>(Self::PLUG_SATURATION)? as f32;
        Ok(PlugValue::Color4f(saturate(color, saturation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plug_graph::{Context, Engine};

    const ORANGE: [f32; 4] = [1.0, 0.5, 0.0, 0.5];

    fn setup() -> Engine {
        let engine = Engine::default();
        engine.add_node("grade", Arc::new(Grade)).unwrap();
        engine.set_value(engine.plug("grade.in").unwrap(), ORANGE).unwrap();
        engine
    }

    #[test]
    fn test_desaturate() {
        let engine = setup();
        let out = engine.plug("grade.out").unwrap();
        engine.set_value(engine.plug("grade.saturation").unwrap(), 0.0).unwrap();

        let grey = engine.get::<[f32; 4]>(out, &Context::new()).unwrap();
        let luminance = 0.2126 + 0.5 * 0.7152;
        for channel in &grey[..3] {
            assert!((channel - luminance).abs() < 1e-6);
        }
        assert_eq!(grey[3], 0.5);
    }

    #[test]
    fn test_neutral_and_disabled_pass_through() {
        let engine = setup();
        let input = engine.plug("grade.in").unwrap();
        let out = engine.plug("grade.out").unwrap();
        let ctx = Context::new();

        assert_eq!(engine.hash(out, &ctx).unwrap(), engine.hash(input, &ctx).unwrap());
        assert_eq!(engine.get::<[f32; 4]>(out, &ctx).unwrap(), ORANGE);

        engine.set_value(engine.plug("grade.saturation").unwrap(), 2.0).unwrap();
        assert_ne!(engine.hash(out, &ctx).unwrap(), engine.hash(input, &ctx).unwrap());
        assert_ne!(engine.get::<[f32; 4]>(out, &ctx).unwrap(), ORANGE);

        engine.set_value(engine.plug("grade.enabled").unwrap(), false).unwrap();
        assert_eq!(engine.hash(out, &ctx).unwrap(), engine.hash(input, &ctx).unwrap());
        assert_eq!(engine.get::<[f32; 4]>(out, &ctx).unwrap(), ORANGE);
    }
}
