//! The conversion engine: walks a source and a target attribute in lockstep
//! and renders the Go statements assigning one to the other.
//!
//! Objects are converted in two passes. Primitive fields are gathered into a
//! single composite literal (plus guarded assignments for optional values),
//! then composite fields are converted one by one. Nested user types with a
//! composite definition are delegated to helper functions held in a
//! [`HelperRegistry`].
use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::policy::{self, Access, FieldFacts};
use super::registry::{HelperDescriptor, HelperKey, HelperRegistry};
use super::{matcher, naming, wrap, Direction, Representation, Side};
use crate::error::TransformError;
use crate::ir::{AttributeExpr, DataType, MappedAttributeExpr, PrimitiveKind, ShapeKind, TypeTable};

type Result<T> = std::result::Result<T, TransformError>;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Immutable generation context for one direction and package pair.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    types: &'a TypeTable,
    direction: Direction,
    source_pkg: &'a str,
    target_pkg: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct Pair<'p> {
    source: &'p AttributeExpr,
    target: &'p AttributeExpr,
}

/// Pair after message wrapping has been seen through.
struct Unified<'p> {
    pair: Pair<'p>,
    unwrapped: Option<Side>,
}

/// State shared by every statement of one generated function body.
struct Body<'r> {
    registry: &'r mut HelperRegistry,
    temps: BTreeSet<String>,
}

/// Position of a conversion inside the design, used for error paths and
/// for naming loop variables and scratch locals.
#[derive(Debug, Clone)]
struct Site {
    path: String,
    arrays: usize,
    maps: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'p> Pair<'p> {
    fn service(&self, direction: Direction) -> &'p AttributeExpr {
        match direction.service_side() {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }
}

impl<'r> Body<'r> {
    fn new(registry: &'r mut HelperRegistry) -> Self {
        Self { registry, temps: BTreeSet::new() }
    }

    /// Local variable name derived from a field, unique within the body.
    fn temp(&mut self, field: &str) -> String {
        let base = format!("{}ptr", naming::goify(field, false));
        let mut name = base.clone();
        let mut n = 1;
        while !self.temps.insert(name.clone()) {
            n += 1;
            name = format!("{base}{n}");
        }
        name
    }
}

impl Site {
    fn root(path: impl Into<String>) -> Self {
        Self { path: path.into(), arrays: 0, maps: 0 }
    }

    fn field(&self, name: &str) -> Self {
        Self { path: format!("{}.{name}", self.path), ..self.clone() }
    }

    fn element(&self) -> Self {
        Self { path: format!("{}[*]", self.path), arrays: self.arrays + 1, maps: self.maps }
    }

    fn key(&self) -> Self {
        Self { path: format!("{}[key]", self.path), arrays: self.arrays, maps: self.maps + 1 }
    }

    fn value(&self) -> Self {
        Self { path: format!("{}[value]", self.path), arrays: self.arrays, maps: self.maps + 1 }
    }

    /// `i`, `j`, `k`... by array depth.
    fn loop_var(&self) -> String {
        match u8::try_from(self.arrays) {
            // stop before `v`, the helper parameter
            Ok(n) if n < 13 => char::from(b'i' + n).to_string(),
            _ => format!("i{}", self.arrays),
        }
    }

    /// `""`, `"b"`, `"c"`... by map depth.
    fn map_suffix(&self) -> String {
        match u8::try_from(self.maps) {
            Ok(0) => String::new(),
            Ok(n) if n < 26 => char::from(b'a' + n).to_string(),
            _ => self.maps.to_string(),
        }
    }
}

impl<'a> Engine<'a> {
    pub fn new(types: &'a TypeTable, direction: Direction, source_pkg: &'a str, target_pkg: &'a str) -> Self {
        Self { types, direction, source_pkg, target_pkg }
    }

    /// Statements assigning `source_var` (of type `source`) to `target_var`
    /// (of type `target`). Helpers are registered into `registry`.
    pub fn transform(
        &self,
        registry: &mut HelperRegistry,
        source: &AttributeExpr,
        target: &AttributeExpr,
        source_var: &str,
        target_var: &str,
        declare_new: bool,
    ) -> Result<String> {
        let mut body = Body::new(registry);
        let site = Site::root(self.types.describe(source));
        let pair = Pair { source, target };
        let code = self.transform_attribute(&mut body, &site, pair, source_var, target_var, declare_new)?;
        debug!(
            direction = %self.direction,
            source = %self.types.describe(source),
            target = %self.types.describe(target),
            helpers = body.registry.len(),
            "generated transform"
        );
        Ok(code.trim_end_matches('\n').to_string())
    }

    /// Register every helper the conversion of `source` into `target` calls,
    /// without rendering the top-level statements.
    pub fn collect_helpers(
        &self,
        registry: &mut HelperRegistry,
        source: &AttributeExpr,
        target: &AttributeExpr,
    ) -> Result<()> {
        let site = Site::root(self.types.describe(source));
        self.collect(registry, &site, Pair { source, target }, true)
    }

    // ---- Dispatch ---- //

    fn transform_attribute(
        &self,
        body: &mut Body<'_>,
        site: &Site,
        pair: Pair<'_>,
        source_var: &str,
        target_var: &str,
        new_var: bool,
    ) -> Result<String> {
        let wrapper_target = pair.target;
        let Unified { pair, unwrapped } = self.unify(pair, source_var, target_var, &site.path)?;
        let mut code = String::new();
        let mut source_var = source_var.to_string();
        let mut target_var = target_var.to_string();
        let mut new_var = new_var;
        let wrapper_field = naming::field_name(wrap::WRAPPER_FIELD, Representation::ProtoBuf);
        match unwrapped {
            Some(Side::Target) => {
                let wrapper = naming::full_type_name(
                    self.types, wrapper_target, self.target_pkg, Representation::ProtoBuf,
                );
                code.push_str(&format!("{target_var} {} &{wrapper}{{}}\n", assign(new_var)));
                target_var = format!("{target_var}.{wrapper_field}");
                new_var = false;
            }
            Some(Side::Source) => source_var = format!("{source_var}.{wrapper_field}"),
            None => {}
        }
        // shapes agree after unification, so either side selects the branch
        let source = self.types.resolve(pair.source)?;
        let target = self.types.resolve(pair.target)?;
        let rest = match (&source.ty, &target.ty) {
            (DataType::Object(_), DataType::Object(_)) => {
                self.transform_object(body, site, pair, &source_var, &target_var, new_var)?
            }
            (DataType::Array(se), DataType::Array(te)) => {
                let elems = Pair { source: se, target: te };
                self.transform_array(body, site, elems, &source_var, &target_var, new_var)?
            }
            (DataType::Map(sk, se), DataType::Map(tk, te)) => {
                let keys = Pair { source: sk, target: tk };
                let elems = Pair { source: se, target: te };
                self.transform_map(body, site, keys, elems, &source_var, &target_var, new_var)?
            }
            _ => self.transform_primitive(pair, &source_var, &target_var, new_var),
        };
        code.push_str(&rest);
        Ok(code)
    }

    /// Check that the pair can be converted, seeing through a protobuf
    /// wrapper message on the rigid side at most once.
    fn unify<'p>(&'p self, pair: Pair<'p>, source_var: &str, target_var: &str, path: &str) -> Result<Unified<'p>> {
        let Err(err) = matcher::compatible(self.types, pair.source, pair.target, source_var, target_var, path) else {
            return Ok(Unified { pair, unwrapped: None });
        };
        let (recovered, side) = match self.direction.rigid_side() {
            Some(Side::Target) => match wrap::unwrap(self.types, pair.target) {
                Some(inner) => (Pair { target: inner, ..pair }, Side::Target),
                None => return Err(err),
            },
            Some(Side::Source) => match wrap::unwrap(self.types, pair.source) {
                Some(inner) => (Pair { source: inner, ..pair }, Side::Source),
                None => return Err(err),
            },
            None => return Err(err),
        };
        trace!(path, ?side, "seeing through wrapper message");
        matcher::compatible(self.types, recovered.source, recovered.target, source_var, target_var, path)
            .map_err(matcher::after_wrap)?;
        Ok(Unified { pair: recovered, unwrapped: Some(side) })
    }

    /// Converts a non-primitive field, array element or map entry: through
    /// a helper call for composite user types, inline otherwise.
    fn transform_nested(
        &self,
        body: &mut Body<'_>,
        site: &Site,
        pair: Pair<'_>,
        source_var: &str,
        target_var: &str,
        new_var: bool,
    ) -> Result<String> {
        if self.helper_eligible(pair.service(self.direction))? {
            let name = self.ensure_helper(body.registry, pair)?;
            return Ok(format!("{target_var} {} {name}({source_var})\n", assign(new_var)));
        }
        self.transform_attribute(body, site, pair, source_var, target_var, new_var)
    }

    // ---- Primitives ---- //

    fn transform_primitive(&self, pair: Pair<'_>, source_var: &str, target_var: &str, new_var: bool) -> String {
        let expr = if self.direction.target_repr() == Representation::Service && pair.target.user_type_id().is_some() {
            // named primitive types need an explicit conversion
            let name = naming::full_type_name(self.types, pair.target, self.target_pkg, Representation::Service);
            format!("{name}({source_var})")
        } else {
            self.convert(pair, source_var)
        };
        format!("{target_var} {} {expr}\n", assign(new_var))
    }

    /// Cast `expr` when the integer types differ between the two representations.
    fn convert(&self, pair: Pair<'_>, expr: &str) -> String {
        let (Some(sk), Some(tk)) = (self.types.primitive_kind(pair.source), self.types.primitive_kind(pair.target)) else {
            return expr.to_string();
        };
        // floats are assigned as is whatever their width
        if !sk.is_integer() {
            return expr.to_string();
        }
        let from = naming::native_type(sk, self.direction.source_repr());
        let to = naming::native_type(tk, self.direction.target_repr());
        if from == to { expr.to_string() } else { format!("{to}({expr})") }
    }

    // ---- Objects ---- //

    fn facts(&self, sm: &MappedAttributeExpr<'_>, tm: &MappedAttributeExpr<'_>, name: &str, pair: Pair<'_>) -> FieldFacts {
        let sk = self.types.primitive_kind(pair.source);
        let tk = self.types.primitive_kind(pair.target);
        FieldFacts {
            primitive: sk.is_some() && tk.is_some(),
            source_pointer_capable: sk.is_some_and(PrimitiveKind::pointer_capable),
            target_pointer_capable: tk.is_some_and(PrimitiveKind::pointer_capable),
            source_required: sm.is_required(name),
            source_has_default: sm.has_default(name),
            target_required: tm.is_required(name),
            target_has_default: tm.has_default(name),
        }
    }

    fn transform_object(
        &self,
        body: &mut Body<'_>,
        site: &Site,
        pair: Pair<'_>,
        source_var: &str,
        target_var: &str,
        new_var: bool,
    ) -> Result<String> {
        let source_repr = self.direction.source_repr();
        let target_repr = self.direction.target_repr();
        let sm = MappedAttributeExpr::new(self.types, pair.source)?;
        let tm = MappedAttributeExpr::new(self.types, pair.target)?;
        let matched = matched_fields(&sm, &tm);
        trace!(path = %site.path, fields = matched.len(), "converting object");

        // pass 1: primitives into the composite literal
        let mut temps = String::new();
        let mut init = String::new();
        let mut deferred = String::new();
        for &(name, field) in &matched {
            let facts = self.facts(&sm, &tm, name, field);
            if !facts.primitive {
                continue;
            }
            let decision = policy::decide(self.direction, &facts);
            let src = format!("{source_var}.{}", sm.field_name_for(name, source_repr));
            let tgt = tm.field_name_for(name, target_repr);
            match decision.access {
                Access::Direct if decision.source_pointer && decision.target_pointer => {
                    let deref = format!("*{src}");
                    let converted = self.convert(field, &deref);
                    if converted == deref {
                        init.push_str(&format!("\t{tgt}: {src},\n"));
                    } else {
                        let tmp = body.temp(name);
                        deferred.push_str(&format!(
                            "if {src} != nil {{\n\t{tmp} := {converted}\n\t{target_var}.{tgt} = &{tmp}\n}}\n"
                        ));
                    }
                }
                Access::Direct => {
                    init.push_str(&format!("\t{tgt}: {},\n", self.convert(field, &src)));
                }
                Access::Dereference => {
                    init.push_str(&format!("\t{tgt}: {},\n", self.convert(field, &format!("*{src}"))));
                }
                Access::DeferWithGuard => {
                    let value = self.convert(field, &format!("*{src}"));
                    deferred.push_str(&format!("if {src} != nil {{\n\t{target_var}.{tgt} = {value}\n}}\n"));
                }
                Access::AddressOf => {
                    let converted = self.convert(field, &src);
                    if converted == src {
                        init.push_str(&format!("\t{tgt}: &{src},\n"));
                    } else {
                        let tmp = body.temp(name);
                        temps.push_str(&format!("{tmp} := {converted}\n"));
                        init.push_str(&format!("\t{tgt}: &{tmp},\n"));
                    }
                }
            }
        }
        let amp = if pair.target.is_bare_object() { "" } else { "&" };
        let type_name = naming::full_type_name(self.types, pair.target, self.target_pkg, target_repr);
        let mut code = temps;
        if init.is_empty() {
            code.push_str(&format!("{target_var} {} {amp}{type_name}{{}}\n", assign(new_var)));
        } else {
            code.push_str(&format!("{target_var} {} {amp}{type_name}{{\n{init}}}\n", assign(new_var)));
        }
        code.push_str(&deferred);

        // pass 2: composites, then default back-fill
        for &(name, field) in &matched {
            let facts = self.facts(&sm, &tm, name, field);
            let decision = policy::decide(self.direction, &facts);
            let src = format!("{source_var}.{}", sm.field_name_for(name, source_repr));
            let tgt = format!("{target_var}.{}", tm.field_name_for(name, target_repr));
            if !facts.primitive {
                let nested = self.transform_nested(body, &site.field(name), field, &src, &tgt, false)?;
                if decision.guard {
                    code.push_str(&guard(&format!("{src} != nil"), &nested));
                } else {
                    code.push_str(&nested);
                }
            }
            if decision.backfill {
                if let Some(default) = tm.default_value(name) {
                    let value = naming::go_literal(self.types, default, field.target, self.target_pkg, target_repr);
                    code.push_str(&guard(&format!("{src} == nil"), &format!("{tgt} = {value}\n")));
                }
            }
        }
        Ok(code)
    }

    // ---- Collections ---- //

    fn transform_array(
        &self,
        body: &mut Body<'_>,
        site: &Site,
        elems: Pair<'_>,
        source_var: &str,
        target_var: &str,
        new_var: bool,
    ) -> Result<String> {
        let elem_ref = naming::type_ref(self.types, elems.target, self.target_pkg, self.direction.target_repr());
        let index = site.loop_var();
        let inner = self.transform_nested(
            body, &site.element(), elems, "val", &format!("{target_var}[{index}]"), false,
        )?;
        Ok(format!(
            "{target_var} {} make([]{elem_ref}, len({source_var}))\nfor {index}, val := range {source_var} {{\n{}}}\n",
            assign(new_var),
            indent(&inner),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn transform_map(
        &self,
        body: &mut Body<'_>,
        site: &Site,
        keys: Pair<'_>,
        elems: Pair<'_>,
        source_var: &str,
        target_var: &str,
        new_var: bool,
    ) -> Result<String> {
        let repr = self.direction.target_repr();
        let key_ref = naming::type_ref(self.types, keys.target, self.target_pkg, repr);
        let elem_ref = naming::type_ref(self.types, elems.target, self.target_pkg, repr);
        let suffix = site.map_suffix();
        let key_var = format!("tk{suffix}");
        let value_var = format!("tv{suffix}");
        let key_code = self.transform_nested(body, &site.key(), keys, "key", &key_var, true)?;
        let value_code = self.transform_nested(body, &site.value(), elems, "val", &value_var, true)?;
        Ok(format!(
            "{target_var} {} make(map[{key_ref}]{elem_ref}, len({source_var}))\nfor key, val := range {source_var} {{\n{}{}\t{target_var}[{key_var}] = {value_var}\n}}\n",
            assign(new_var),
            indent(&key_code),
            indent(&value_code),
        ))
    }

    // ---- Helpers ---- //

    fn helper_eligible(&self, attr: &AttributeExpr) -> Result<bool> {
        if attr.user_type_id().is_none() {
            return Ok(false);
        }
        Ok(!matches!(self.types.shape(attr)?, ShapeKind::Primitive(_)))
    }

    /// Name of the helper converting `pair`, registering it on first use.
    fn ensure_helper(&self, registry: &mut HelperRegistry, pair: Pair<'_>) -> Result<String> {
        let name = naming::helper_name(self.types, pair.source, pair.target, self.direction);
        let key = HelperKey::new(self.types, pair.source, pair.target, self.direction);
        registry.get_or_create(key, &name, |registry| self.build_helper(registry, &name, pair))?;
        Ok(name)
    }

    /// The body is the same for every call site: a nil-able parameter is
    /// always checked, so element loops may call the helper unguarded.
    fn build_helper(&self, registry: &mut HelperRegistry, name: &str, pair: Pair<'_>) -> Result<HelperDescriptor> {
        let source_def = match pair.source.user_type_id() {
            Some(id) => self.types.definition(id)?,
            None => pair.source,
        };
        let mut body = Body::new(registry);
        let site = Site::root(self.types.describe(pair.source));
        let inner = Pair { source: source_def, target: pair.target };
        let mut code = self.transform_attribute(&mut body, &site, inner, "v", "res", true)?;
        let param_type_ref = naming::type_ref(self.types, pair.source, self.source_pkg, self.direction.source_repr());
        let result_type_ref = naming::type_ref(self.types, pair.target, self.target_pkg, self.direction.target_repr());
        if naming::is_nilable(self.types, pair.source) {
            let zero = naming::zero_value(self.types, pair.target, &result_type_ref);
            code = format!("if v == nil {{\n\treturn {zero}\n}}\n{code}");
        }
        debug!(helper = name, "generated helper");
        Ok(HelperDescriptor { name: name.to_string(), param_type_ref, result_type_ref, code })
    }

    /// Mirrors the traversal of [`Self::transform_attribute`] so that helpers
    /// are registered in the same order.
    fn collect(&self, registry: &mut HelperRegistry, site: &Site, pair: Pair<'_>, top: bool) -> Result<()> {
        if !top && self.helper_eligible(pair.service(self.direction))? {
            self.ensure_helper(registry, pair)?;
            return Ok(());
        }
        let pair = self.unify(pair, "source", "target", &site.path)?.pair;
        let source = self.types.resolve(pair.source)?;
        let target = self.types.resolve(pair.target)?;
        match (&source.ty, &target.ty) {
            (DataType::Object(_), DataType::Object(_)) => {
                let sm = MappedAttributeExpr::new(self.types, pair.source)?;
                let tm = MappedAttributeExpr::new(self.types, pair.target)?;
                for (name, field) in matched_fields(&sm, &tm) {
                    if self.types.is_primitive(field.source) && self.types.is_primitive(field.target) {
                        continue;
                    }
                    self.collect(registry, &site.field(name), field, false)?;
                }
                Ok(())
            }
            (DataType::Array(se), DataType::Array(te)) => {
                self.collect(registry, &site.element(), Pair { source: se, target: te }, false)
            }
            (DataType::Map(sk, se), DataType::Map(tk, te)) => {
                self.collect(registry, &site.key(), Pair { source: sk, target: tk }, false)?;
                self.collect(registry, &site.value(), Pair { source: se, target: te }, false)
            }
            _ => Ok(()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Fields present on both sides, in source order.
fn matched_fields<'m>(sm: &MappedAttributeExpr<'m>, tm: &MappedAttributeExpr<'m>) -> Vec<(&'m str, Pair<'m>)> {
    sm.fields()
        .iter()
        .filter_map(|sf| {
            tm.attribute(sf.logical)
                .map(|target| (sf.logical, Pair { source: sf.attribute, target }))
        })
        .collect()
}

fn assign(new_var: bool) -> &'static str {
    if new_var { ":=" } else { "=" }
}

fn indent(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 16);
    for line in code.lines() {
        if !line.is_empty() {
            out.push('\t');
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

fn guard(condition: &str, code: &str) -> String {
    format!("if {condition} {{\n{}}}\n", indent(code))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
