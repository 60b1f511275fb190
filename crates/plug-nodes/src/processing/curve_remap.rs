//! Curve Remap
//!
//! Maps a float through a spline.

use std::sync::Arc;

use plug_graph::{
    ComputeContext, ComputeNode, Direction, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result, SplineDefinition, SplineInterpolation,
};

/// Curve Remap
///
/// # Plugs
/// - `curve` (spline, in) - identity by default
/// - `in` (float, in)
/// - `out` (float, out) - `curve(in)`
pub struct CurveRemap;

impl CurveRemap {
    pub const PLUG_CURVE: &'static str = "curve";
    pub const PLUG_IN: &'static str = "in";
    pub const PLUG_OUT: &'static str = "out";

    pub fn default_curve() -> SplineDefinition {
        SplineDefinition::new([(0.0, 0.0), (1.0, 1.0)], SplineInterpolation::CatmullRom)
    }
}

impl NodeDescriptor for CurveRemap {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &CurveRemap,
            NodeCategory::Processing,
            "Curve Remap",
            "Remaps a value through an editable curve",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "CurveRemap",
    descriptor: CurveRemap::descriptor,
    factory: || Arc::new(CurveRemap),
});

impl ComputeNode for CurveRemap {
    fn type_name(&self) -> &str {
        "CurveRemap"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::spline(Self::PLUG_CURVE, Direction::In, Self::default_curve()),
            PlugDefinition::input(Self::PLUG_IN, PlugType::Float),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        let on_curve = input
            .strip_prefix(Self::PLUG_CURVE)
            .map(|rest| rest.is_empty() || rest.starts_with('.'))
            .unwrap_or(false);
        if on_curve || input == Self::PLUG_IN {
            vec![Self::PLUG_OUT.to_string()]
        } else {
            Vec::new()
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(Self::PLUG_CURVE, h)?;
        ctx.append_plug_hash(Self::PLUG_IN, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let spline = ctx.get_spline(Self::PLUG_CURVE)?.spline();
        let value = ctx.get::<f64>(Self::PLUG_IN)?;
        Ok(PlugValue::Float(spline.evaluate(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Frame;
    use plug_graph::{keys, validate_graph, Context, Engine};

    fn setup() -> Engine {
        let engine = Engine::default();
        engine.add_node("remap", Arc::new(CurveRemap)).unwrap();
        engine
    }

    #[test]
    fn test_default_curve_is_identity() {
        let engine = setup();
        let input = engine.plug("remap.in").unwrap();
        let out = engine.plug("remap.out").unwrap();
        for x in [0.0, 0.25, 0.5, 0.9] {
            engine.set_value(input, x).unwrap();
            let y = engine.get::<f64>(out, &Context::new()).unwrap();
            assert!((y - x).abs() < 1e-6, "{x} -> {y}");
        }
    }

    #[test]
    fn test_editing_the_curve() {
        let engine = setup();
        let curve = engine.spline_plug(engine.plug("remap.curve").unwrap()).unwrap();
        let input = engine.plug("remap.in").unwrap();
        let out = engine.plug("remap.out").unwrap();
        engine.set_value(input, 0.5).unwrap();

        let before = engine.hash(out, &Context::new()).unwrap();
        curve
            .set_value(&SplineDefinition::new(
                [(0.0, 1.0), (1.0, 0.0)],
                SplineInterpolation::Linear,
            ))
            .unwrap();
        assert_ne!(engine.hash(out, &Context::new()).unwrap(), before);
        assert!((engine.get::<f64>(out, &Context::new()).unwrap() - 0.5).abs() < 1e-9);

        engine.set_value(input, 0.25).unwrap();
        assert!((engine.get::<f64>(out, &Context::new()).unwrap() - 0.75).abs() < 1e-9);

        // Moving one point through its child plug
        engine.set_value(curve.point_y_plug(1).unwrap(), 1.0).unwrap();
        assert!((engine.get::<f64>(out, &Context::new()).unwrap() - 1.0).abs() < 1e-9);

        curve.set_to_default().unwrap();
        assert!(curve.is_set_to_default().unwrap());
        assert!((engine.get::<f64>(out, &Context::new()).unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_animated_point() {
        let engine = setup();
        engine.add_node("frame", Arc::new(Frame)).unwrap();
        engine.set_value(engine.plug("frame.scale").unwrap(), 0.1).unwrap();
        let curve = engine.spline_plug(engine.plug("remap.curve").unwrap()).unwrap();
        curve
            .set_value(&SplineDefinition::new(
                [(0.0, 0.0), (1.0, 0.0)],
                SplineInterpolation::Linear,
            ))
            .unwrap();
        engine
            .connect(engine.plug("frame.out").unwrap(), curve.point_y_plug(1).unwrap())
            .unwrap();

        let input = engine.plug("remap.in").unwrap();
        let out = engine.plug("remap.out").unwrap();
        engine.set_value(input, 1.0).unwrap();
        for frame in [1.0, 5.0, 10.0] {
            let y = engine.get::<f64>(out, &Context::new().with(keys::FRAME, frame)).unwrap();
            assert!((y - frame * 0.1).abs() < 1e-9);
        }
        assert!(validate_graph(&engine.graph()).is_empty());
    }
}
