//! Named operation dispatch.
//!
//! The registry maps an operation name to its parameter schema and the
//! function that runs it. Parameters are resolved against the schema before
//! dispatch: missing values take their defaults, unknown names and
//! out-of-range values are rejected.

use super::{
    align_to_start, compress_to_scale, duplicate_pattern, evenly_space, mirror_pattern, quantize,
    reverse, scale_positions, shift, CounterStyle, DevelopMethod, InvertAxis, MelodyAnalysis,
    MelodyOperators, OrnamentStyle, StandardOperators,
};
use crate::error::{MelodyError, Result};
use crate::midi::EventSequence;
use crate::theory::ScaleModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A raw or resolved parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Reads a command-line value: integer, then float, then text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            Self::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Self::Float(f)
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Parameters keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

/// Accepted shape of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParamKind {
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Choice { options: &'static [&'static str] },
    /// One of the named options, or an integer in the given range.
    ChoiceOrInt {
        options: &'static [&'static str],
        min: i64,
        max: i64,
    },
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
    pub default: ParamValue,
}

impl ParamSpec {
    fn int(name: &'static str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int { min, max },
            default: ParamValue::Int(default),
        }
    }

    fn float(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float { min, max },
            default: ParamValue::Float(default),
        }
    }

    fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: ParamKind::Choice { options },
            default: ParamValue::Text(options[0].to_string()),
        }
    }

    /// Checks `value` against this spec, returning it in canonical form.
    fn resolve(&self, value: &ParamValue) -> Result<ParamValue> {
        let invalid = |message: String| MelodyError::validation(self.name, message);
        match (&self.kind, value) {
            (ParamKind::Int { min, max }, ParamValue::Int(i))
            | (ParamKind::ChoiceOrInt { min, max, .. }, ParamValue::Int(i)) => {
                if (min..=max).contains(&i) {
                    Ok(ParamValue::Int(*i))
                } else {
                    Err(invalid(format!("must be between {} and {}, got {}", min, max, i)))
                }
            }
            (ParamKind::Int { .. }, ParamValue::Float(x)) if x.fract() == 0.0 => {
                self.resolve(&ParamValue::Int(*x as i64))
            }
            (ParamKind::Float { .. }, ParamValue::Int(i)) => {
                self.resolve(&ParamValue::Float(*i as f64))
            }
            (ParamKind::Float { min, max }, ParamValue::Float(x)) => {
                if x.is_finite() && (min..=max).contains(&x) {
                    Ok(ParamValue::Float(*x))
                } else {
                    Err(invalid(format!("must be between {} and {}, got {}", min, max, x)))
                }
            }
            (ParamKind::Choice { options }, ParamValue::Text(s))
            | (ParamKind::ChoiceOrInt { options, .. }, ParamValue::Text(s)) => {
                let normalized = s.trim().to_lowercase();
                if options.contains(&normalized.as_str()) {
                    Ok(ParamValue::Text(normalized))
                } else {
                    Err(invalid(format!(
                        "expected one of {}, got '{}'",
                        options.join(", "),
                        s
                    )))
                }
            }
            (kind, other) => Err(invalid(format!(
                "{} is not a valid {} value",
                other,
                kind_label(kind)
            ))),
        }
    }
}

fn kind_label(kind: &ParamKind) -> &'static str {
    match kind {
        ParamKind::Int { .. } => "integer",
        ParamKind::Float { .. } => "number",
        ParamKind::Choice { .. } => "choice",
        ParamKind::ChoiceOrInt { .. } => "choice or integer",
    }
}

/// Parameters after defaults and validation have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved(Params);

impl Resolved {
    fn get(&self, name: &str) -> Result<&ParamValue> {
        self.0
            .get(name)
            .ok_or_else(|| MelodyError::validation(name, "missing from schema"))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            ParamValue::Int(i) => Ok(*i),
            other => Err(MelodyError::validation(name, format!("{} is not an integer", other))),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            ParamValue::Float(x) => Ok(*x),
            ParamValue::Int(i) => Ok(*i as f64),
            other => Err(MelodyError::validation(name, format!("{} is not a number", other))),
        }
    }

    /// Text value, or the integer rendered as text.
    pub fn text(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.to_string())
    }
}

/// Result of running an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Sequence(EventSequence),
    Analysis(MelodyAnalysis),
}

impl Outcome {
    /// The transformed sequence, if the operation produced one.
    pub fn sequence(&self) -> Option<&EventSequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            Self::Analysis(_) => None,
        }
    }
}

type Runner =
    fn(&dyn MelodyOperators, &EventSequence, &ScaleModel, &Resolved) -> Result<Outcome>;

/// A registered operation: schema plus runner.
pub struct OperationSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub params: Vec<ParamSpec>,
    run: Runner,
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl OperationSpec {
    /// Fills defaults and validates `params` against the schema.
    pub fn resolve(&self, params: &Params) -> Result<Resolved> {
        if let Some(unknown) = params
            .keys()
            .find(|k| !self.params.iter().any(|p| p.name == k.as_str()))
        {
            return Err(MelodyError::validation(
                unknown.as_str(),
                format!("'{}' does not take this parameter", self.name),
            ));
        }
        let mut resolved = Params::new();
        for spec in &self.params {
            let value = params.get(spec.name).unwrap_or(&spec.default);
            resolved.insert(spec.name.to_string(), spec.resolve(value)?);
        }
        Ok(Resolved(resolved))
    }
}

fn seq(result: Result<EventSequence>) -> Result<Outcome> {
    result.map(Outcome::Sequence)
}

const INVERT_AXES: &[&str] = &["center", "first-note", "last-note"];
const COUNTER_STYLES: &[&str] = &["contrary", "parallel", "oblique", "mixed"];
const ORNAMENT_STYLES: &[&str] = &["classical", "baroque", "jazz", "minimal"];
const DEVELOP_METHODS: &[&str] = &["sequence", "fragment", "extend", "retrograde"];

/// Longest viewport, in seconds, accepted by the viewport edits.
const MAX_VIEWPORT: f64 = 3600.0;

fn viewport_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::float("start", 0.0, MAX_VIEWPORT, 0.0),
        ParamSpec::float("duration", 0.01, MAX_VIEWPORT, 4.0),
    ]
}

fn standard_operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec {
            name: "transpose",
            summary: "shift every pitch by semitones",
            params: vec![ParamSpec::int("semitones", -48, 48, 0)],
            run: |ops, s, _, p| seq(ops.transpose(s, p.int("semitones")? as i32)),
        },
        OperationSpec {
            name: "transpose-diatonic",
            summary: "shift every pitch by scale degrees",
            params: vec![ParamSpec::int("steps", -28, 28, 0)],
            run: |ops, s, k, p| seq(ops.transpose_diatonic(s, k, p.int("steps")? as i32)),
        },
        OperationSpec {
            name: "invert",
            summary: "mirror pitches around an axis",
            params: vec![ParamSpec {
                name: "axis",
                kind: ParamKind::ChoiceOrInt {
                    options: INVERT_AXES,
                    min: 0,
                    max: 127,
                },
                default: ParamValue::Text("center".to_string()),
            }],
            run: |ops, s, _, p| {
                let axis: InvertAxis = p.text("axis")?.parse()?;
                seq(ops.invert(s, axis))
            },
        },
        OperationSpec {
            name: "augment",
            summary: "stretch durations and onsets",
            params: vec![ParamSpec::float("factor", 1.0, 8.0, 2.0)],
            run: |ops, s, _, p| seq(ops.augment(s, p.float("factor")?)),
        },
        OperationSpec {
            name: "diminish",
            summary: "compress durations and onsets",
            params: vec![ParamSpec::float("factor", 0.05, 1.0, 0.5)],
            run: |ops, s, _, p| seq(ops.diminish(s, p.float("factor")?)),
        },
        OperationSpec {
            name: "harmonize",
            summary: "add a parallel voice at a scale interval",
            params: vec![ParamSpec::int("interval", -15, 15, 3)],
            run: |ops, s, k, p| seq(ops.harmonize(s, k, p.int("interval")? as i32)),
        },
        OperationSpec {
            name: "counter-melody",
            summary: "derive a second voice",
            params: vec![ParamSpec::choice("style", COUNTER_STYLES)],
            run: |ops, s, k, p| {
                let style: CounterStyle = p.text("style")?.parse()?;
                seq(ops.counter_melody(s, k, style))
            },
        },
        OperationSpec {
            name: "ornament",
            summary: "decorate notes with neighbour tones",
            params: vec![ParamSpec::choice("style", ORNAMENT_STYLES)],
            run: |ops, s, k, p| {
                let style: OrnamentStyle = p.text("style")?.parse()?;
                seq(ops.ornament(s, k, style))
            },
        },
        OperationSpec {
            name: "develop",
            summary: "apply a motivic development",
            params: vec![ParamSpec::choice("method", DEVELOP_METHODS)],
            run: |ops, s, k, p| {
                let method: DevelopMethod = p.text("method")?.parse()?;
                seq(ops.develop(s, k, method))
            },
        },
        OperationSpec {
            name: "analyze",
            summary: "report structural metrics",
            params: vec![],
            run: |ops, s, k, _| Ok(Outcome::Analysis(ops.analyze(s, k))),
        },
        OperationSpec {
            name: "evenly-space",
            summary: "spread notes evenly across the viewport",
            params: viewport_params(),
            run: |_, s, _, p| seq(evenly_space(s, p.float("start")?, p.float("duration")?)),
        },
        OperationSpec {
            name: "quantize",
            summary: "snap onsets to a grid",
            params: vec![ParamSpec::float("grid", 0.01, 4.0, 0.25)],
            run: |_, s, _, p| seq(quantize(s, p.float("grid")?)),
        },
        OperationSpec {
            name: "scale-positions",
            summary: "compress or expand onsets around the viewport centre",
            params: {
                let mut params = vec![ParamSpec::float("factor", 0.1, 10.0, 0.5)];
                params.extend(viewport_params());
                params
            },
            run: |_, s, _, p| {
                seq(scale_positions(
                    s,
                    p.float("factor")?,
                    p.float("start")?,
                    p.float("duration")?,
                ))
            },
        },
        OperationSpec {
            name: "shift",
            summary: "move every onset",
            params: vec![ParamSpec::float("amount", -MAX_VIEWPORT, MAX_VIEWPORT, 0.25)],
            run: |_, s, _, p| seq(shift(s, p.float("amount")?)),
        },
        OperationSpec {
            name: "reverse",
            summary: "mirror onsets within the viewport",
            params: viewport_params(),
            run: |_, s, _, p| seq(reverse(s, p.float("start")?, p.float("duration")?)),
        },
        OperationSpec {
            name: "align-to-start",
            summary: "move the pattern to start at a given time",
            params: vec![ParamSpec::float("start", 0.0, MAX_VIEWPORT, 0.0)],
            run: |_, s, _, p| seq(align_to_start(s, p.float("start")?)),
        },
        OperationSpec {
            name: "compress-to-scale",
            summary: "snap every pitch into the key",
            params: vec![],
            run: |_, s, k, _| Ok(Outcome::Sequence(compress_to_scale(s, k))),
        },
        OperationSpec {
            name: "duplicate",
            summary: "append a copy of the pattern",
            params: vec![ParamSpec::float("offset", 0.0, MAX_VIEWPORT, 2.0)],
            run: |_, s, _, p| seq(duplicate_pattern(s, p.float("offset")?)),
        },
        OperationSpec {
            name: "mirror",
            summary: "append the pattern played backwards",
            params: vec![],
            run: |_, s, _, _| seq(mirror_pattern(s)),
        },
    ]
}

/// Name-to-operation table over one [`MelodyOperators`] implementation.
pub struct OperationRegistry {
    operators: Box<dyn MelodyOperators>,
    operations: BTreeMap<&'static str, OperationSpec>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    /// Registry backed by [`StandardOperators`].
    pub fn new() -> Self {
        Self::with_operators(Box::new(StandardOperators))
    }

    /// Registry backed by a custom operator set.
    pub fn with_operators(operators: Box<dyn MelodyOperators>) -> Self {
        let operations = standard_operations()
            .into_iter()
            .map(|op| (op.name, op))
            .collect();
        Self {
            operators,
            operations,
        }
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operations.keys().copied()
    }

    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }

    /// Resolves parameters and runs the named operation.
    ///
    /// # Errors
    ///
    /// [`MelodyError::UnknownOperation`] for an unregistered name, a
    /// validation error for bad parameters, or whatever the operator returns.
    pub fn apply(
        &self,
        name: &str,
        sequence: &EventSequence,
        scale: &ScaleModel,
        params: &Params,
    ) -> Result<Outcome> {
        let spec = self
            .operations
            .get(name)
            .ok_or_else(|| MelodyError::UnknownOperation(name.to_string()))?;
        let resolved = spec.resolve(params)?;
        tracing::debug!(
            "Applying {} to {} notes with {:?}",
            name,
            sequence.len(),
            resolved
        );
        (spec.run)(self.operators.as_ref(), sequence, scale, &resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MelodicEvent;
    use crate::theory::Mode;

    fn melody() -> EventSequence {
        EventSequence::from_events(vec![
            MelodicEvent::new(60, 0.0, 0.5, 0.8).unwrap(),
            MelodicEvent::new(64, 0.5, 0.5, 0.8).unwrap(),
            MelodicEvent::new(67, 1.0, 0.5, 0.8).unwrap(),
        ])
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::parse(v)))
            .collect()
    }

    #[test]
    fn test_every_named_operation_is_registered() {
        let registry = OperationRegistry::new();
        for name in [
            "transpose",
            "transpose-diatonic",
            "invert",
            "augment",
            "diminish",
            "harmonize",
            "counter-melody",
            "ornament",
            "develop",
            "analyze",
            "evenly-space",
            "quantize",
            "scale-positions",
            "shift",
            "reverse",
            "align-to-start",
            "compress-to-scale",
            "duplicate",
            "mirror",
        ] {
            assert!(registry.get(name).is_some(), "{} missing", name);
        }
    }

    #[test]
    fn test_defaults_and_every_operation_runs() {
        let registry = OperationRegistry::new();
        let scale = ScaleModel::new(0, Mode::Major);
        for name in registry.names().collect::<Vec<_>>() {
            let outcome = registry.apply(name, &melody(), &scale, &Params::new());
            assert!(outcome.is_ok(), "{} failed: {:?}", name, outcome);
        }
    }

    #[test]
    fn test_counter_melody_is_onset_ordered() {
        // Mixed durations put the second original before the first counter note
        let mixed = EventSequence::from_events(vec![
            MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap(),
            MelodicEvent::new(64, 1.0, 0.25, 0.8).unwrap(),
        ]);
        let registry = OperationRegistry::new();
        let out = registry
            .apply("counter-melody", &mixed, &ScaleModel::default(), &Params::new())
            .unwrap();
        let onsets: Vec<f64> = out.sequence().unwrap().iter().map(|e| e.onset()).collect();
        assert_eq!(onsets, vec![0.0, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_transpose_dispatch() {
        let registry = OperationRegistry::new();
        let out = registry
            .apply("transpose", &melody(), &ScaleModel::default(), &params(&[("semitones", "3")]))
            .unwrap();
        let pitches: Vec<_> = out.sequence().unwrap().iter().map(|e| e.pitch()).collect();
        assert_eq!(pitches, vec![63, 67, 70]);
    }

    #[test]
    fn test_parameter_validation() {
        let registry = OperationRegistry::new();
        let scale = ScaleModel::default();

        let err = registry
            .apply("augment", &melody(), &scale, &params(&[("factor", "20")]))
            .unwrap_err();
        assert!(matches!(err, MelodyError::Validation { ref field, .. } if field == "factor"));

        assert!(registry
            .apply("ornament", &melody(), &scale, &params(&[("style", "rococo")]))
            .is_err());
        assert!(registry
            .apply("transpose", &melody(), &scale, &params(&[("octaves", "1")]))
            .is_err());
        assert!(registry
            .apply("transpose", &melody(), &scale, &params(&[("semitones", "up")]))
            .is_err());
        assert!(matches!(
            registry.apply("granulate", &melody(), &scale, &Params::new()),
            Err(MelodyError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_invert_accepts_pitch_or_name() {
        let registry = OperationRegistry::new();
        let scale = ScaleModel::default();
        let out = registry
            .apply("invert", &melody(), &scale, &params(&[("axis", "64")]))
            .unwrap();
        assert_eq!(out.sequence().unwrap().events()[0].pitch(), 68);

        let out = registry
            .apply("invert", &melody(), &scale, &params(&[("axis", "First-Note")]))
            .unwrap();
        assert_eq!(out.sequence().unwrap().events()[2].pitch(), 53);
    }

    #[test]
    fn test_analyze_returns_metrics() {
        let registry = OperationRegistry::new();
        match registry
            .apply("analyze", &melody(), &ScaleModel::default(), &Params::new())
            .unwrap()
        {
            Outcome::Analysis(a) => assert_eq!(a.intervals, vec![4, 3]),
            other => panic!("expected analysis, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_serializes() {
        let registry = OperationRegistry::new();
        let spec = registry.get("augment").unwrap();
        let json = serde_json::to_value(&spec.params).unwrap();
        assert_eq!(json[0]["name"], "factor");
        assert_eq!(json[0]["kind"], "float");
        assert_eq!(json[0]["default"], 2.0);
    }
}
