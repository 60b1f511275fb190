//! Small nodes used by the engine's unit tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::graph::{ChildPolicy, Direction, PlugDefinition};
use crate::hash::FingerprintHasher;
use crate::node::{ComputeContext, ComputeNode};
use crate::spline::{SplineDefinition, SplineInterpolation};
use crate::value::{PlugType, PlugValue};

/// `out` forwards `in`; `count` is `in` truncated to an int
pub struct Passthrough;

impl ComputeNode for Passthrough {
    fn type_name(&self) -> &str {
        "Passthrough"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input("in", PlugType::Float),
            PlugDefinition::output("out", PlugType::Float),
            PlugDefinition::output("count", PlugType::Int),
            PlugDefinition::input("label", PlugType::String),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            "in" => vec!["out".to_string(), "count".to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash("in", h)
    }

    fn compute(&self, output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        match output {
            "count" => Ok(PlugValue::Int(ctx.get::<f64>("in")? as i64)),
            _ => Err(ctx.error("not computed")),
        }
    }

    fn pass_through(&self, output: &str, _ctx: &ComputeContext<'_>) -> Result<Option<String>> {
        Ok((output == "out").then(|| "in".to_string()))
    }
}

/// `out = in * 2`, counting computations.
///
/// Flags make it slow, failing, or requesting its own output.
#[derive(Default)]
pub struct Counting {
    pub computes: AtomicUsize,
    pub delay_ms: AtomicU64,
    pub fail: AtomicBool,
    pub recurse: AtomicBool,
}

impl ComputeNode for Counting {
    fn type_name(&self) -> &str {
        "Counting"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input("in", PlugType::Float),
            PlugDefinition::output("out", PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            "in" => vec!["out".to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash("in", h)?;
        ctx.append_context_variable("frame", h);
        Ok(())
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        if self.recurse.load(Ordering::SeqCst) {
            ctx.get_value("out")?;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ctx.error("negative input"));
        }
        Ok(PlugValue::Float(ctx.get::<f64>("in")? * 2.0))
    }
}

/// Takes ~200ms to produce 42, checking for cancellation as it goes
#[derive(Default)]
pub struct Slow {
    pub started: AtomicUsize,
}

impl ComputeNode for Slow {
    fn type_name(&self) -> &str {
        "Slow"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![PlugDefinition::output("out", PlugType::Int)]
    }

    fn affects(&self, _input: &str) -> Vec<String> {
        Vec::new()
    }

    fn hash(&self, _output: &str, _ctx: &ComputeContext<'_>, _h: &mut FingerprintHasher) -> Result<()> {
        Ok(())
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        self.started.fetch_add(1, Ordering::SeqCst);
        for _ in 0..40 {
            ctx.check_cancelled()?;
            thread::sleep(Duration::from_millis(5));
        }
        Ok(PlugValue::Int(42))
    }
}

/// Compound in/out: `out.x = in.x * 2`, `out.y = in.y * 2`
pub struct Pair;

fn xy(name: &str, direction: Direction) -> PlugDefinition {
    PlugDefinition::compound(
        name,
        direction,
        vec![
            PlugDefinition::input("x", PlugType::Float),
            PlugDefinition::input("y", PlugType::Float),
        ],
    )
}

impl ComputeNode for Pair {
    fn type_name(&self) -> &str {
        "Pair"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            xy("in", Direction::In),
            xy("out", Direction::Out),
            PlugDefinition::input("label", PlugType::String),
            PlugDefinition::compound("extra", Direction::In, Vec::new()).with_child_policy(ChildPolicy::Numeric),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            "in" => vec!["out".to_string()],
            "in.x" => vec!["out.x".to_string()],
            "in.y" => vec!["out.y".to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(&output.replace("out", "in"), h)
    }

    fn compute(&self, output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let value = ctx.get::<f64>(&output.replace("out", "in"))?;
        Ok(PlugValue::Float(value * 2.0))
    }
}

/// `out` is the dynamic child `w` of `extra`, or -1 without one
#[derive(Default)]
pub struct Lookup {
    pub computes: AtomicUsize,
}

impl ComputeNode for Lookup {
    fn type_name(&self) -> &str {
        "Lookup"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::compound("extra", Direction::In, Vec::new()).with_child_policy(ChildPolicy::Numeric),
            PlugDefinition::output("out", PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        if input == "extra" || input.starts_with("extra.") {
            vec!["out".to_string()]
        } else {
            Vec::new()
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash("extra", h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        let extra = ctx.get_value("extra")?;
        let w = extra.child("w").and_then(PlugValue::as_float).unwrap_or(-1.0);
        Ok(PlugValue::Float(w))
    }
}

/// `out = curve(in)` through a spline plug
pub struct Curve;

impl Curve {
    pub fn default_curve() -> SplineDefinition {
        SplineDefinition::new([(0.0, 0.0), (1.0, 1.0)], SplineInterpolation::Linear)
    }
}

impl ComputeNode for Curve {
    fn type_name(&self) -> &str {
        "Curve"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::spline("curve", Direction::In, Self::default_curve()),
            PlugDefinition::input("in", PlugType::Float),
            PlugDefinition::output("out", PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        if input == "in" || input == "curve" || input.starts_with("curve.") {
            vec!["out".to_string()]
        } else {
            Vec::new()
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash("curve", h)?;
        ctx.append_plug_hash("in", h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let spline = ctx.get_spline("curve")?.spline();
        Ok(PlugValue::Float(spline.evaluate(ctx.get::<f64>("in")?)))
    }
}
