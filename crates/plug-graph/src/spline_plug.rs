//! Spline plugs
//!
//! A spline plug stores a `SplineDefinition` as child plugs so that single
//! point coordinates can be connected like any other plug:
//!
//! ```text
//! curve                 (spline)
//! ├── interpolation     (int, SplineInterpolation::index)
//! ├── p0                (compound, numeric children only)
//! │   ├── x             (float)
//! │   └── y             (float)
//! └── p1 ...
//! ```
//!
//! Writing a definition reconciles the point children with the desired
//! point count before assigning coordinates, all within one edit.

use std::collections::HashSet;

use crate::context::Context;
use crate::edit::GraphEdit;
use crate::engine::Engine;
use crate::error::{PlugGraphError, Result};
use crate::graph::{ChildPolicy, Direction, Graph, PlugDefinition, PlugId};
use crate::hash::{compound_hash, static_value_hash, Fingerprint};
use crate::spline::SplineDefinition;
use crate::value::{PlugType, PlugValue};

/// Name of the interpolation child
pub const INTERPOLATION: &str = "interpolation";

fn point_definition(name: &str, direction: Direction, x: f64, y: f64) -> PlugDefinition {
    PlugDefinition::compound(
        name,
        direction,
        vec![
            PlugDefinition::input("x", PlugType::Float).with_default(x),
            PlugDefinition::input("y", PlugType::Float).with_default(y),
        ],
    )
    .with_child_policy(ChildPolicy::Numeric)
}

/// Children of a spline plug holding `definition`
pub(crate) fn child_definitions(definition: &SplineDefinition, direction: Direction) -> Vec<PlugDefinition> {
    let interpolation = PlugDefinition {
        direction,
        ..PlugDefinition::input(INTERPOLATION, PlugType::Int).with_default(definition.interpolation().index())
    };
    std::iter::once(interpolation)
        .chain(
            definition
                .points()
                .iter()
                .enumerate()
                .map(|(i, (x, y))| point_definition(&format!("p{i}"), direction, *x, *y)),
        )
        .collect()
}

/// Whether `definition` has the shape of a spline point
pub(crate) fn is_point_definition(definition: &PlugDefinition) -> bool {
    definition.plug_type == PlugType::Compound
        && definition.children.len() == 2
        && definition
            .children
            .iter()
            .zip(["x", "y"])
            .all(|(child, name)| child.name == name && child.plug_type == PlugType::Float)
}

fn child_named(graph: &Graph, parent: PlugId, name: &str) -> Result<PlugId> {
    let plug = graph.plug(parent)?;
    plug.children()
        .iter()
        .copied()
        .find(|c| graph.plug(*c).map(|p| p.name() == name).unwrap_or(false))
        .ok_or_else(|| PlugGraphError::UnknownPlug(format!("{}.{}", graph.display_name(parent), name)))
}

fn point_ids(graph: &Graph, spline: PlugId) -> Result<Vec<PlugId>> {
    let plug = graph.plug(spline)?;
    Ok(plug
        .children()
        .iter()
        .copied()
        .filter(|c| graph.plug(*c).map(|p| p.name() != INTERPOLATION).unwrap_or(false))
        .collect())
}

fn add_point_in(edit: &mut GraphEdit<'_>, spline: PlugId) -> Result<PlugId> {
    let graph = edit.graph();
    let plug = graph.plug(spline)?;
    let direction = plug.direction();
    let taken: HashSet<String> = plug
        .children()
        .iter()
        .filter_map(|c| graph.plug(*c).ok().map(|p| p.name().to_string()))
        .collect();
    let name = (0..)
        .map(|i| format!("p{i}"))
        .find(|name| !taken.contains(name))
        .unwrap_or_default();
    edit.add_child(spline, point_definition(&name, direction, 0.0, 0.0))
}

/// Static value of a plug subtree, ignoring connections
fn static_value(graph: &Graph, id: PlugId) -> Result<PlugValue> {
    let plug = graph.plug(id)?;
    if !plug.plug_type().is_compound() {
        return plug
            .static_value()
            .cloned()
            .ok_or_else(|| PlugGraphError::Internal(format!("{} has no value", graph.display_name(id))));
    }
    let mut children = Vec::with_capacity(plug.children().len());
    for child in plug.children() {
        children.push((graph.plug(*child)?.name().to_string(), static_value(graph, *child)?));
    }
    Ok(PlugValue::Compound(children))
}

fn has_connections(graph: &Graph, id: PlugId) -> bool {
    std::iter::once(id)
        .chain(graph.descendants(id))
        .any(|p| graph.plug(p).map(|p| p.input().is_some()).unwrap_or(false))
}

/// Handle for editing and reading a spline plug
pub struct SplinePlug<'e> {
    engine: &'e Engine,
    id: PlugId,
}

impl Engine {
    /// Access a spline plug; fails if `id` is not one
    pub fn spline_plug(&self, id: PlugId) -> Result<SplinePlug<'_>> {
        let graph = self.graph();
        let plug = graph.plug(id)?;
        if plug.plug_type() != PlugType::Spline {
            return Err(PlugGraphError::InvalidValue {
                plug: graph.display_name(id),
                message: format!("expected a spline plug, found {}", plug.plug_type().name()),
            });
        }
        Ok(SplinePlug { engine: self, id })
    }
}

impl SplinePlug<'_> {
    pub fn id(&self) -> PlugId {
        self.id
    }

    /// Number of stored points (never counting expanded end points)
    pub fn num_points(&self) -> Result<usize> {
        let graph = self.engine.graph();
        let points = point_ids(&graph, self.id)?;
        Ok(points.len())
    }

    pub fn interpolation_plug(&self) -> Result<PlugId> {
        let graph = self.engine.graph();
        let plug = child_named(&graph, self.id, INTERPOLATION)?;
        Ok(plug)
    }

    /// The compound plug of the `index`th point, in child order
    pub fn point_plug(&self, index: usize) -> Result<PlugId> {
        let graph = self.engine.graph();
        let points = point_ids(&graph, self.id)?;
        match points.get(index) {
            Some(point) => Ok(*point),
            None => Err(PlugGraphError::UnknownPlug(format!(
                "{}[{}]",
                graph.display_name(self.id),
                index
            ))),
        }
    }

    pub fn point_x_plug(&self, index: usize) -> Result<PlugId> {
        let point = self.point_plug(index)?;
        let graph = self.engine.graph();
        let plug = child_named(&graph, point, "x")?;
        Ok(plug)
    }

    pub fn point_y_plug(&self, index: usize) -> Result<PlugId> {
        let point = self.point_plug(index)?;
        let graph = self.engine.graph();
        let plug = child_named(&graph, point, "y")?;
        Ok(plug)
    }

    /// Append a point at (0, 0); returns its compound plug
    pub fn add_point(&self) -> Result<PlugId> {
        self.engine.edit(|e| add_point_in(e, self.id))
    }

    /// Remove a point previously returned by `point_plug` or `add_point`
    pub fn remove_point(&self, point: PlugId) -> Result<()> {
        let id = self.id;
        self.engine.edit(|e| {
            if !point_ids(e.graph(), id)?.contains(&point) {
                return Err(PlugGraphError::InvalidChild {
                    parent: e.graph().display_name(id),
                    message: format!("{point} is not a point of this spline"),
                });
            }
            e.remove_child(point)
        })
    }

    pub fn clear_points(&self) -> Result<()> {
        let id = self.id;
        self.engine.edit(|e| {
            for point in point_ids(e.graph(), id)? {
                e.remove_child(point)?;
            }
            Ok(())
        })
    }

    /// Store `definition`, adding or removing point plugs as needed.
    ///
    /// Fails without changes if any part of the spline is connected.
    pub fn set_value(&self, definition: &SplineDefinition) -> Result<()> {
        let id = self.id;
        self.engine.edit(|e| {
            let graph = e.graph();
            if graph.plug(id)?.direction() != Direction::In || has_connections(graph, id) {
                return Err(PlugGraphError::InvalidValue {
                    plug: graph.display_name(id),
                    message: "only unconnected input splines can be set".to_string(),
                });
            }

            // Keep the points already laid out as p0, p1, ... and rebuild the
            // rest, so equal definitions always produce equal children
            let mut points = point_ids(graph, id)?;
            let keep = points
                .iter()
                .take(definition.points().len())
                .enumerate()
                .take_while(|(i, point)| {
                    graph.plug(**point).map(|p| p.name() == format!("p{i}")).unwrap_or(false)
                })
                .count();
            for point in points.split_off(keep) {
                e.remove_child(point)?;
            }
            while points.len() < definition.points().len() {
                points.push(add_point_in(e, id)?);
            }

            let interpolation = child_named(e.graph(), id, INTERPOLATION)?;
            e.set_value(interpolation, PlugValue::Int(definition.interpolation().index()))?;
            for (point, (x, y)) in points.iter().zip(definition.points()) {
                let x_plug = child_named(e.graph(), *point, "x")?;
                let y_plug = child_named(e.graph(), *point, "y")?;
                e.set_value(x_plug, PlugValue::Float(*x))?;
                e.set_value(y_plug, PlugValue::Float(*y))?;
            }
            Ok(())
        })
    }

    /// Assemble the definition from the children's values in `context`
    pub fn get_value(&self, context: &Context) -> Result<SplineDefinition> {
        let value = self.engine.get_value(self.id, context)?;
        SplineDefinition::from_plug_value(&value)
    }

    pub fn default_value(&self) -> Result<SplineDefinition> {
        let graph = self.engine.graph();
        let default = graph.plug(self.id)?.spline_default().cloned();
        Ok(default.unwrap_or_default())
    }

    pub fn set_to_default(&self) -> Result<()> {
        self.set_value(&self.default_value()?)
    }

    /// True if unconnected and holding the default definition
    pub fn is_set_to_default(&self) -> Result<bool> {
        let default = self.default_value()?;
        let graph = self.engine.graph();
        if has_connections(&graph, self.id) {
            return Ok(false);
        }
        let current = static_value(&graph, self.id)?;
        Ok(SplineDefinition::from_plug_value(&current)? == default)
    }

    /// Make the current (static) value the new default
    pub fn reset_default(&self) -> Result<()> {
        let id = self.id;
        self.engine.edit(|e| {
            let current = SplineDefinition::from_plug_value(&static_value(e.graph(), id)?)?;
            e.set_spline_default(id, current);
            Ok(())
        })
    }

    /// The hash the plug has while set to its default
    pub fn default_hash(&self) -> Result<Fingerprint> {
        let default = self.default_value()?;
        let names: Vec<String> = (0..default.points().len()).map(|i| format!("p{i}")).collect();
        let mut children = vec![(
            INTERPOLATION,
            static_value_hash(PlugType::Int, &PlugValue::Int(default.interpolation().index())),
        )];
        for (name, (x, y)) in names.iter().zip(default.points()) {
            let point = compound_hash(
                PlugType::Compound,
                &[
                    ("x", static_value_hash(PlugType::Float, &PlugValue::Float(*x))),
                    ("y", static_value_hash(PlugType::Float, &PlugValue::Float(*y))),
                ],
            );
            children.push((name.as_str(), point));
        }
        Ok(compound_hash(PlugType::Spline, &children))
    }
}
