//! Schema-driven synthetic data, used when the AI path gives up.
//!
//! Values are random but shaped by the schema: types, formats, enums,
//! numeric and length bounds, required properties and combinators. There is
//! no attempt at realism beyond a few property-name hints.

use proptest::strategy::{Strategy, ValueTree};
use proptest::string::string_regex;
use proptest::test_runner::{Config as RunnerConfig, RngAlgorithm, TestRng, TestRunner};
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::services::CompiledSchema;

const DEFAULT_MAX_DEPTH: usize = 6;

// Redraws before settling for the last candidate
const ONE_OF_DRAWS: usize = 8;
const MULTIPLE_DRAWS: usize = 20;
const PATTERN_DRAWS: usize = 40;

// Caps for open-ended repetitions in patterns, cycled across draws
const REPEAT_LIMITS: &[usize] = &[2, 4, 8, 16, 32];

// Numbers are sampled inside +/- this when the declared span overflows f64
const SAMPLE_LIMIT: f64 = 1.0e15;

static ANY_SCHEMA: Value = Value::Bool(true);

// 2019-01-01T00:00:00Z ..= 2025-12-31T23:59:59Z
const EARLIEST_TIMESTAMP: i64 = 1_546_300_800;
const LATEST_TIMESTAMP: i64 = 1_767_225_599;

const WORDS: &[&str] = &[
    "alpha", "amber", "harbor", "summit", "river", "cedar", "copper", "delta", "ember", "falcon",
    "garnet", "meadow", "nimbus", "orchid", "pioneer", "quartz", "sierra", "timber", "velvet",
    "willow",
];
const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Alan", "Linus", "Margaret", "Dennis", "Barbara", "Ken", "Frances", "Edsger",
];
const LAST_NAMES: &[&str] = &[
    "Lovelace", "Hopper", "Turing", "Torvalds", "Hamilton", "Ritchie", "Liskov", "Thompson",
    "Allen", "Dijkstra",
];
const CITIES: &[&str] = &[
    "Lisbon", "Osaka", "Denver", "Nairobi", "Oslo", "Montreal", "Auckland", "Valencia",
];
const COUNTRIES: &[&str] = &[
    "Portugal", "Japan", "United States", "Kenya", "Norway", "Canada", "New Zealand", "Spain",
];

/// Generates schema-conforming values without a model
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    max_depth: usize,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FallbackGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate one value for `schema` using the thread-local RNG
    pub fn generate(&self, schema: &Value) -> Value {
        self.generate_with(&mut rand::rng(), schema)
    }

    /// Generate one value for `schema` using the given RNG
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, schema: &Value) -> Value {
        let mut generation = Generation {
            root: schema,
            rng,
            max_depth: self.max_depth,
        };
        generation.value(schema, 0, None)
    }
}

struct Generation<'a, R: Rng + ?Sized> {
    root: &'a Value,
    rng: &'a mut R,
    max_depth: usize,
}

impl<R: Rng + ?Sized> Generation<'_, R> {
    fn value(&mut self, schema: &Value, depth: usize, name: Option<&str>) -> Value {
        let obj = match schema {
            Value::Object(obj) => obj,
            Value::Bool(false) => return Value::Null,
            _ => return self.any(name),
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let root = self.root;
            return match resolve_ref(root, reference) {
                Some(target) if depth < self.max_depth * 2 => self.value(target, depth + 1, name),
                _ => Value::Null,
            };
        }

        if let Some(constant) = obj.get("const") {
            return constant.clone();
        }

        if let Some(choices) = obj.get("enum").and_then(Value::as_array) {
            if let Some(choice) = choices.choose(self.rng) {
                return choice.clone();
            }
        }

        if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
            let mut merged = without(obj, "allOf");
            for part in all_of {
                let part = self.dereference(part);
                merged = merge_schemas(&merged, &part);
            }
            return self.value(&merged, depth, name);
        }

        if let Some(branches) = obj.get("oneOf").and_then(Value::as_array) {
            if !branches.is_empty() {
                return self.one_of(obj, branches, depth, name);
            }
        }

        if let Some(branches) = obj.get("anyOf").and_then(Value::as_array) {
            if let Some(branch) = branches.choose(self.rng) {
                let branch = self.dereference(branch);
                let merged = merge_schemas(&without(obj, "anyOf"), &branch);
                return self.value(&merged, depth, name);
            }
        }

        match self.pick_type(obj).as_str() {
            "object" => self.object(obj, depth),
            "array" => self.array(obj, depth),
            "integer" => self.integer(obj),
            "number" => self.number(obj),
            "boolean" => Value::Bool(self.rng.random_bool(0.5)),
            "null" => Value::Null,
            _ => self.string(obj, name),
        }
    }

    /// Draw from one branch until the value matches that branch and no other
    fn one_of(
        &mut self,
        obj: &Map<String, Value>,
        branches: &[Value],
        depth: usize,
        name: Option<&str>,
    ) -> Value {
        let base = without(obj, "oneOf");
        let resolved: Vec<Value> = branches.iter().map(|b| self.dereference(b)).collect();
        let validators: Vec<Option<CompiledSchema>> = resolved
            .iter()
            .map(|b| CompiledSchema::compile(&with_definitions(self.root, b)).ok())
            .collect();

        let mut value = Value::Null;
        for _ in 0..ONE_OF_DRAWS {
            let chosen = self.rng.random_range(0..resolved.len());
            let others: Vec<&Value> = resolved
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != chosen)
                .map(|(_, b)| b)
                .collect();
            let merged = merge_schemas(&base, &resolved[chosen]);
            let merged = omit_claimed_properties(&merged, &others);
            value = self.value(&merged, depth, name);

            let exclusive = validators.iter().enumerate().all(|(i, validator)| {
                let matches = validator.as_ref().is_some_and(|v| v.is_valid(&value));
                if i == chosen {
                    matches || validator.is_none()
                } else {
                    !matches
                }
            });
            if exclusive {
                break;
            }
        }
        value
    }

    /// Follow a top-level `$ref` so its keywords can be merged
    fn dereference(&self, schema: &Value) -> Value {
        let mut current = schema;
        for _ in 0..self.max_depth {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => match resolve_ref(self.root, reference) {
                    Some(target) => current = target,
                    None => break,
                },
                None => break,
            }
        }
        current.clone()
    }

    fn pick_type(&mut self, obj: &Map<String, Value>) -> String {
        match obj.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                let non_null: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();
                non_null
                    .choose(self.rng)
                    .or_else(|| names.first())
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "null".to_string())
            }
            _ => infer_type(obj).to_string(),
        }
    }

    fn any(&mut self, name: Option<&str>) -> Value {
        self.string(&Map::new(), name)
    }

    // ============ Objects ============

    fn object(&mut self, obj: &Map<String, Value>, depth: usize) -> Value {
        let empty = Map::new();
        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let min_properties = usize_keyword(obj, "minProperties").unwrap_or(0);
        let max_properties = usize_keyword(obj, "maxProperties").unwrap_or(usize::MAX);
        let additional = obj.get("additionalProperties");
        let allows_additional = !matches!(additional, Some(Value::Bool(false)));

        let mut result = Map::new();

        for key in &required {
            let schema = properties.get(*key).unwrap_or(&ANY_SCHEMA);
            let value = self.value(schema, depth + 1, Some(*key));
            result.insert(key.to_string(), value);
        }

        let shallow = depth < self.max_depth;
        for (key, schema) in properties {
            if result.contains_key(key) || result.len() >= max_properties {
                continue;
            }
            let wanted = result.len() < min_properties || (shallow && self.rng.random_bool(0.6));
            if wanted {
                let value = self.value(schema, depth + 1, Some(key.as_str()));
                result.insert(key.clone(), value);
            }
        }

        let mut extra = 1;
        while result.len() < min_properties && allows_additional {
            let key = format!("field_{}", extra);
            extra += 1;
            if result.contains_key(&key) {
                continue;
            }
            let value = match additional {
                Some(schema @ Value::Object(_)) => self.value(schema, depth + 1, Some(key.as_str())),
                _ => self.any(Some(key.as_str())),
            };
            result.insert(key, value);
        }

        Value::Object(result)
    }

    // ============ Arrays ============

    fn array(&mut self, obj: &Map<String, Value>, depth: usize) -> Value {
        let min_items = usize_keyword(obj, "minItems").unwrap_or(0);
        let max_items = usize_keyword(obj, "maxItems").unwrap_or(min_items.max(1) + 2);
        let count = if depth >= self.max_depth {
            min_items
        } else {
            let low = min_items.max(1).min(max_items);
            let high = max_items.min(low + 3).max(low);
            self.rng.random_range(low..=high)
        };
        let unique = obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);

        // Tuple forms: draft 2020-12 `prefixItems`, older array-valued `items`
        let prefix: Vec<Value> = match (obj.get("prefixItems"), obj.get("items")) {
            (Some(Value::Array(prefix)), _) => prefix.clone(),
            (None, Some(Value::Array(prefix))) => prefix.clone(),
            _ => Vec::new(),
        };
        let rest = match (obj.get("prefixItems"), obj.get("items")) {
            (Some(_), Some(items)) => items.clone(),
            (None, Some(Value::Array(_))) => obj
                .get("additionalItems")
                .cloned()
                .unwrap_or(Value::Bool(true)),
            (_, Some(items)) => items.clone(),
            (_, None) => Value::Bool(true),
        };

        let mut items: Vec<Value> = Vec::with_capacity(count);
        if let Some(contains) = obj.get("contains") {
            items.push(self.value(contains, depth + 1, None));
        }

        let total = count.max(items.len());
        let mut index = items.len();
        while items.len() < total {
            let schema = prefix.get(index).unwrap_or(&rest).clone();
            if schema == Value::Bool(false) {
                break;
            }
            let mut candidate = self.value(&schema, depth + 1, None);
            if unique {
                for _ in 0..10 {
                    if !items.contains(&candidate) {
                        break;
                    }
                    candidate = self.value(&schema, depth + 1, None);
                }
            }
            items.push(candidate);
            index += 1;
        }

        Value::Array(items)
    }

    // ============ Numbers ============

    fn bounds(&self, obj: &Map<String, Value>) -> (Option<f64>, bool, Option<f64>, bool) {
        let mut min = obj.get("minimum").and_then(Value::as_f64);
        let mut max = obj.get("maximum").and_then(Value::as_f64);
        let mut min_exclusive = false;
        let mut max_exclusive = false;

        match obj.get("exclusiveMinimum") {
            Some(Value::Number(n)) => {
                let n = n.as_f64();
                if n.is_some_and(|n| min.is_none_or(|m| n >= m)) {
                    min = n;
                    min_exclusive = true;
                }
            }
            Some(Value::Bool(true)) => min_exclusive = min.is_some(),
            _ => {}
        }
        match obj.get("exclusiveMaximum") {
            Some(Value::Number(n)) => {
                let n = n.as_f64();
                if n.is_some_and(|n| max.is_none_or(|m| n <= m)) {
                    max = n;
                    max_exclusive = true;
                }
            }
            Some(Value::Bool(true)) => max_exclusive = max.is_some(),
            _ => {}
        }

        (min, min_exclusive, max, max_exclusive)
    }

    fn integer(&mut self, obj: &Map<String, Value>) -> Value {
        let (min, min_exclusive, max, max_exclusive) = self.bounds(obj);

        let mut low = min.map(|m| if min_exclusive { m.floor() + 1.0 } else { m.ceil() });
        let mut high = max.map(|m| if max_exclusive { m.ceil() - 1.0 } else { m.floor() });
        match (low, high) {
            (None, None) => {
                low = Some(1.0);
                high = Some(1000.0);
            }
            (Some(l), None) => high = Some(l + 1000.0),
            (None, Some(h)) => low = Some((h - 1000.0).min(h.min(1.0))),
            _ => {}
        }
        let low = low.unwrap_or(1.0) as i64;
        let high = high.unwrap_or(1000.0) as i64;
        if low > high {
            return Value::from(low);
        }

        if let Some(step) = obj.get("multipleOf").and_then(Value::as_f64) {
            if step >= 1.0 && step.fract() == 0.0 {
                let step = step as i64;
                let first = low.div_euclid(step) + i64::from(low.rem_euclid(step) != 0);
                let last = high.div_euclid(step);
                if first <= last {
                    return Value::from(self.rng.random_range(first..=last) * step);
                }
            }
        }

        Value::from(self.rng.random_range(low..=high))
    }

    fn number(&mut self, obj: &Map<String, Value>) -> Value {
        let (min, min_exclusive, max, max_exclusive) = self.bounds(obj);

        let (low, high) = match (min, max) {
            (None, None) => (0.0, 1000.0),
            (Some(l), None) => (l, l + 1000.0),
            (None, Some(h)) => ((h - 1000.0).min(0.0_f64.min(h)), h),
            (Some(l), Some(h)) => (l, h),
        };
        let (low, high) = if (high - low).is_finite() {
            (low, high)
        } else {
            (low.max(-SAMPLE_LIMIT), high.min(SAMPLE_LIMIT))
        };
        let in_bounds = |v: f64| {
            v >= low && v <= high && !(min_exclusive && v <= low) && !(max_exclusive && v >= high)
        };

        if let Some(step) = obj.get("multipleOf").and_then(Value::as_f64).filter(|s| *s > 0.0) {
            let decimals = decimal_places(step);
            let first = (low / step).ceil() as i64;
            let last = (high / step).floor() as i64;
            let mut candidate = round_to(first as f64 * step, decimals);
            if first <= last {
                for _ in 0..MULTIPLE_DRAWS {
                    let k = self.rng.random_range(first..=last) as f64;
                    candidate = round_to(k * step, decimals);
                    if in_bounds(candidate) && (candidate / step).fract() == 0.0 {
                        break;
                    }
                }
            }
            return number_value(candidate);
        }

        if low > high {
            return number_value(low);
        }

        let raw = self.rng.random_range(low..=high);
        let mut value = if raw.abs() < SAMPLE_LIMIT {
            round_to(raw, 2)
        } else {
            raw
        };
        if !in_bounds(value) {
            value = low / 2.0 + high / 2.0;
        }
        number_value(value)
    }

    // ============ Strings ============

    fn string(&mut self, obj: &Map<String, Value>, name: Option<&str>) -> Value {
        let min_length = usize_keyword(obj, "minLength").unwrap_or(0);
        let max_length = usize_keyword(obj, "maxLength");
        let pattern = obj
            .get("pattern")
            .and_then(Value::as_str)
            .and_then(|p| Regex::new(p).ok().map(|regex| (p, regex)));
        let fits = |text: &str| {
            let length = text.chars().count();
            length >= min_length && max_length.is_none_or(|max| length <= max)
        };

        if let Some(format) = obj.get("format").and_then(Value::as_str) {
            if let Some(formatted) = self.formatted(format, min_length, max_length) {
                if fits(formatted.as_str()) && pattern.as_ref().is_none_or(|(_, r)| r.is_match(&formatted)) {
                    return Value::String(formatted);
                }
            }
        }

        if let Some((source, regex)) = &pattern {
            if let Some(text) = self.matching(source, regex, &fits) {
                return Value::String(text);
            }
        }

        let base = self.hinted(name).unwrap_or_else(|| self.words(2));
        Value::String(fit_length(&base, min_length, max_length, &mut *self.rng))
    }

    /// Draw strings from `pattern` until one also fits the length bounds
    fn matching(&mut self, pattern: &str, regex: &Regex, fits: &dyn Fn(&str) -> bool) -> Option<String> {
        let body = strip_anchors(pattern);
        let strategies: Vec<_> = REPEAT_LIMITS
            .iter()
            .filter_map(|limit| string_regex(&ascii_classes(&bound_repetitions(body, *limit))).ok())
            .collect();
        if strategies.is_empty() {
            return None;
        }

        let seed: [u8; 32] = self.rng.random();
        let mut runner = TestRunner::new_with_rng(
            RunnerConfig::default(),
            TestRng::from_seed(RngAlgorithm::ChaCha, &seed),
        );

        (0..PATTERN_DRAWS)
            .filter_map(|draw| {
                let strategy = &strategies[draw % strategies.len()];
                strategy.new_tree(&mut runner).ok().map(|tree| tree.current())
            })
            .find(|text| fits(text.as_str()) && regex.is_match(text))
    }

    fn formatted(&mut self, format: &str, min_length: usize, max_length: Option<usize>) -> Option<String> {
        let rng = &mut *self.rng;
        let value = match format {
            "email" | "idn-email" => email(rng, min_length, max_length),
            "date-time" => random_instant(rng).format(&Rfc3339).ok()?,
            "date" => random_instant(rng)
                .format(format_description!("[year]-[month]-[day]"))
                .ok()?,
            "time" => random_instant(rng)
                .format(format_description!("[hour]:[minute]:[second]Z"))
                .ok()?,
            "uuid" => uuid::Builder::from_random_bytes(rng.random())
                .into_uuid()
                .to_string(),
            "uri" | "url" | "iri" => format!(
                "https://example.com/{}",
                WORDS.choose(rng).copied().unwrap_or("resource")
            ),
            "uri-reference" | "iri-reference" => {
                format!("/{}", WORDS.choose(rng).copied().unwrap_or("resource"))
            }
            "hostname" | "idn-hostname" => format!(
                "{}.example.com",
                WORDS.choose(rng).copied().unwrap_or("api")
            ),
            "ipv4" => format!(
                "{}.{}.{}.{}",
                rng.random_range(1..=223),
                rng.random_range(0..=255),
                rng.random_range(0..=255),
                rng.random_range(1..=254)
            ),
            "ipv6" => format!(
                "2001:db8::{:x}:{:x}",
                rng.random_range(1..=0xffff_u32),
                rng.random_range(1..=0xffff_u32)
            ),
            "uri-template" => "https://example.com/items/{id}".to_string(),
            "json-pointer" => "/items/0".to_string(),
            "relative-json-pointer" => "0/items".to_string(),
            "regex" => "^[a-z]+$".to_string(),
            "duration" => format!("P{}D", rng.random_range(1..=30)),
            _ => return None,
        };
        Some(value)
    }

    /// Slightly better strings for common property names
    fn hinted(&mut self, name: Option<&str>) -> Option<String> {
        let name = name?.to_lowercase().replace(['_', '-'], "");
        let rng = &mut *self.rng;
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Lovelace");

        let value = match name.as_str() {
            "name" | "fullname" | "username" | "author" | "owner" => {
                format!("{} {}", first, last)
            }
            "firstname" | "givenname" => first.to_string(),
            "lastname" | "surname" | "familyname" => last.to_string(),
            "city" => CITIES.choose(rng).copied().unwrap_or("Lisbon").to_string(),
            "country" => COUNTRIES.choose(rng).copied().unwrap_or("Portugal").to_string(),
            "phone" | "phonenumber" => format!("+1-555-{:04}", rng.random_range(0..10000)),
            "status" => ["active", "pending", "inactive"]
                .choose(rng)
                .copied()
                .unwrap_or("active")
                .to_string(),
            "id" => uuid::Builder::from_random_bytes(rng.random())
                .into_uuid()
                .to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn words(&mut self, count: usize) -> String {
        let rng = &mut *self.rng;
        let words: Vec<&str> = (0..count)
            .filter_map(|_| WORDS.choose(rng).copied())
            .collect();
        words.join(" ")
    }
}

fn infer_type(obj: &Map<String, Value>) -> &'static str {
    let has = |keys: &[&str]| keys.iter().any(|k| obj.contains_key(*k));
    if has(&["properties", "required", "additionalProperties", "minProperties"]) {
        "object"
    } else if has(&["items", "prefixItems", "minItems", "maxItems", "contains"]) {
        "array"
    } else if has(&["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"]) {
        "number"
    } else {
        "string"
    }
}

/// Resolve a local `#/...` JSON pointer reference against the root schema
fn resolve_ref<'v>(root: &'v Value, reference: &str) -> Option<&'v Value> {
    if reference == "#" {
        return Some(root);
    }
    let pointer = reference.strip_prefix('#')?;
    root.pointer(pointer)
}

fn without(obj: &Map<String, Value>, keyword: &str) -> Value {
    let mut copy = obj.clone();
    copy.remove(keyword);
    Value::Object(copy)
}

/// Merge two schemas for generation: properties merge recursively, `required` unions, other keywords from `overlay` win
fn merge_schemas(base: &Value, overlay: &Value) -> Value {
    let (Some(base), Some(overlay)) = (base.as_object(), overlay.as_object()) else {
        return if overlay.is_object() {
            overlay.clone()
        } else {
            base.clone()
        };
    };

    let mut merged = base.clone();
    for (key, value) in overlay {
        match key.as_str() {
            "properties" => {
                let mut properties = merged
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if let Some(extra) = value.as_object() {
                    for (name, schema) in extra {
                        let combined = match properties.get(name) {
                            Some(existing) => merge_schemas(existing, schema),
                            None => schema.clone(),
                        };
                        properties.insert(name.clone(), combined);
                    }
                }
                merged.insert(key.clone(), Value::Object(properties));
            }
            "required" => {
                let mut required: Vec<Value> = merged
                    .get("required")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for name in value.as_array().into_iter().flatten() {
                    if !required.contains(name) {
                        required.push(name.clone());
                    }
                }
                merged.insert(key.clone(), Value::Array(required));
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}

fn usize_keyword(obj: &Map<String, Value>, keyword: &str) -> Option<usize> {
    obj.get(keyword)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn decimal_places(step: f64) -> i32 {
    let text = step.to_string();
    let places = text.split_once('.').map_or(0, |(_, fraction)| fraction.len());
    places.min(15) as i32
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// `first.last@example.com`, shortened or padded to the length bounds
fn email<R: Rng + ?Sized>(rng: &mut R, min_length: usize, max_length: Option<usize>) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("ada");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("lovelace");
    let mut local = format!("{}.{}", first, last).to_lowercase();

    let long_domain = "example.com";
    let domain = match max_length {
        Some(max) if local.len() + 1 + long_domain.len() > max => "ex.io",
        _ => long_domain,
    };
    if let Some(max) = max_length {
        local.truncate(max.saturating_sub(domain.len() + 1).max(1));
        local = local.trim_end_matches('.').to_string();
        if local.is_empty() {
            local.push('a');
        }
    }
    // Local parts stop at 64 characters
    while local.len() + 1 + domain.len() < min_length && local.len() < 64 {
        local.push(char::from(b'0' + rng.random_range(0..10u8)));
    }

    format!("{}@{}", local, domain)
}

/// Drop the outer `^`/`$`; generated text is matched whole anyway
fn strip_anchors(pattern: &str) -> &str {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    match body.strip_suffix('$') {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => body,
    }
}

/// Give `*`, `+` and `{n,}` an upper bound of `limit` extra repetitions
fn bound_repetitions(pattern: &str, limit: usize) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '*' if !in_class => out.push_str(&format!("{{0,{}}}", limit)),
            '+' if !in_class => out.push_str(&format!("{{1,{}}}", limit)),
            '{' if !in_class => {
                let rest = chars.as_str();
                let open_ended = rest
                    .split_once('}')
                    .and_then(|(inner, _)| inner.strip_suffix(','))
                    .and_then(|min| min.parse::<usize>().ok());
                match open_ended {
                    Some(min) => {
                        out.push_str(&format!("{{{},{}}}", min, min + limit));
                        let skip = rest.find('}').map_or(0, |i| i + 1);
                        chars = rest[skip..].chars();
                    }
                    None => out.push(c),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Spell `\d`, `\w` and `\s` as ASCII classes, the way ECMA-262 reads them
fn ascii_classes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(next) = chars.next() else {
                    out.push(c);
                    break;
                };
                let class = match next {
                    'd' => Some("0-9"),
                    'w' => Some("A-Za-z0-9_"),
                    's' => Some(" \\t\\n\\r"),
                    _ => None,
                };
                match class {
                    Some(class) if in_class => out.push_str(class),
                    Some(class) => {
                        out.push('[');
                        out.push_str(class);
                        out.push(']');
                    }
                    None => {
                        out.push(c);
                        out.push(next);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Copy the root's definitions next to `branch` so its local refs still resolve on their own
fn with_definitions(root: &Value, branch: &Value) -> Value {
    let (Some(root), Some(branch_obj)) = (root.as_object(), branch.as_object()) else {
        return branch.clone();
    };
    let mut standalone = branch_obj.clone();
    for keyword in ["$defs", "definitions"] {
        if let Some(definitions) = root.get(keyword) {
            standalone
                .entry(keyword.to_string())
                .or_insert_with(|| definitions.clone());
        }
    }
    Value::Object(standalone)
}

/// Remove optional properties another branch requires, so a draw cannot satisfy both
fn omit_claimed_properties(schema: &Value, others: &[&Value]) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };
    let required: Vec<&str> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let claimed: Vec<&str> = others
        .iter()
        .filter_map(|b| b.get("required").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .filter(|name| !required.contains(name))
        .collect();

    let mut trimmed = obj.clone();
    if let Some(Value::Object(properties)) = trimmed.get_mut("properties") {
        for name in claimed {
            properties.remove(name);
        }
    }
    Value::Object(trimmed)
}

fn fit_length<R: Rng + ?Sized>(
    base: &str,
    min_length: usize,
    max_length: Option<usize>,
    rng: &mut R,
) -> String {
    let mut text = base.to_string();
    let mut length = text.chars().count();
    while length < min_length {
        let word = WORDS.choose(rng).copied().unwrap_or("alpha");
        text.push(' ');
        text.push_str(word);
        length = text.chars().count();
    }
    if let Some(max) = max_length {
        if length > max {
            text = text.chars().take(max).collect::<String>().trim_end().to_string();
            // Trimming a trailing space may undercut minLength
            while text.chars().count() < min_length.min(max) {
                text.push('x');
            }
        }
    }
    text
}

/// A whole-second instant between 2019 and the end of 2025
fn random_instant<R: Rng + ?Sized>(rng: &mut R) -> OffsetDateTime {
    let seconds = rng.random_range(EARLIEST_TIMESTAMP..=LATEST_TIMESTAMP);
    OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    /// Every draw for `schema` across many seeds must validate
    fn assert_always_valid(schema: Value) {
        assert_valid_for_seeds(schema, 50);
    }

    fn assert_valid_for_seeds(schema: Value, seeds: u64) {
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let generator = FallbackGenerator::new();
        for seed in 0..seeds {
            let mut rng = StdRng::seed_from_u64(seed);
            let value = generator.generate_with(&mut rng, &schema);
            let report = compiled.validate(&value);
            assert!(
                report.valid,
                "seed {} produced invalid {}: {}",
                seed,
                value,
                report.summary()
            );
        }
    }

    #[test]
    fn test_object_with_formats_and_bounds() {
        assert_always_valid(json!({
            "type": "object",
            "required": ["id", "email", "createdAt", "age", "score", "tags"],
            "additionalProperties": false,
            "properties": {
                "id": {"type": "string", "format": "uuid"},
                "name": {"type": "string", "minLength": 3, "maxLength": 40},
                "email": {"type": "string", "format": "email"},
                "createdAt": {"type": "string", "format": "date-time"},
                "birthday": {"type": "string", "format": "date"},
                "homepage": {"type": "string", "format": "uri"},
                "ip": {"type": "string", "format": "ipv4"},
                "age": {"type": "integer", "minimum": 18, "maximum": 99},
                "score": {"type": "number", "exclusiveMinimum": 0, "maximum": 5},
                "tags": {"type": "array", "items": {"type": "string"}, "minItems": 2, "maxItems": 4, "uniqueItems": true},
                "active": {"type": "boolean"},
                "nickname": {"type": ["string", "null"]}
            }
        }));
    }

    #[test]
    fn test_enum_const_and_multiple_of() {
        assert_always_valid(json!({
            "type": "object",
            "required": ["status", "version", "quantity"],
            "properties": {
                "status": {"enum": ["active", "archived"]},
                "version": {"const": 2},
                "quantity": {"type": "integer", "multipleOf": 5, "minimum": 1, "maximum": 50}
            }
        }));
    }

    #[test]
    fn test_combinators() {
        assert_always_valid(json!({
            "allOf": [
                {"type": "object", "required": ["id"], "properties": {"id": {"type": "integer", "minimum": 1}}},
                {"type": "object", "required": ["title"], "properties": {"title": {"type": "string", "minLength": 1}}}
            ]
        }));
        assert_always_valid(json!({
            "anyOf": [{"type": "string", "format": "email"}, {"type": "integer", "maximum": 0}]
        }));
        assert_always_valid(json!({
            "oneOf": [
                {"type": "object", "required": ["card"], "additionalProperties": false, "properties": {"card": {"type": "string"}}},
                {"type": "object", "required": ["iban"], "additionalProperties": false, "properties": {"iban": {"type": "string"}}}
            ]
        }));
    }

    #[test]
    fn test_local_refs() {
        assert_always_valid(json!({
            "$defs": {
                "address": {
                    "type": "object",
                    "required": ["city", "zip"],
                    "properties": {
                        "city": {"type": "string"},
                        "zip": {"type": "string", "pattern": "^[0-9]{5}$", "minLength": 5, "maxLength": 5}
                    }
                }
            },
            "type": "array",
            "minItems": 1,
            "items": {"$ref": "#/$defs/address"}
        }));
    }

    #[test]
    fn test_recursive_schema_terminates() {
        let schema = json!({
            "$defs": {
                "node": {
                    "type": "object",
                    "required": ["value"],
                    "properties": {
                        "value": {"type": "integer"},
                        "children": {"type": "array", "items": {"$ref": "#/$defs/node"}}
                    }
                }
            },
            "$ref": "#/$defs/node"
        });
        assert_always_valid(schema);
    }

    #[test]
    fn test_min_properties_and_tuples() {
        assert_always_valid(json!({
            "type": "object",
            "minProperties": 3,
            "properties": {"a": {"type": "integer"}}
        }));
        assert_always_valid(json!({
            "type": "array",
            "prefixItems": [{"type": "number"}, {"type": "string", "format": "date"}],
            "items": false,
            "minItems": 2
        }));
    }

    #[test]
    fn test_untyped_schemas() {
        assert_always_valid(json!({}));
        assert_always_valid(json!(true));
        assert_always_valid(json!({"properties": {"id": {"type": "integer"}}, "required": ["id"]}));
    }

    #[test]
    fn test_name_hints() {
        let schema = json!({"type": "object", "required": ["email"], "properties": {"email": {"type": "string", "format": "email"}}});
        let value = FallbackGenerator::new().generate(&schema);
        assert!(value["email"].as_str().unwrap().ends_with("@example.com"));
    }

    #[test]
    fn test_one_of_excludes_other_branches() {
        assert_valid_for_seeds(
            json!({
                "type": "object",
                "properties": {
                    "email": {"type": "string", "format": "email"},
                    "phone": {"type": "string"},
                    "name": {"type": "string"}
                },
                "oneOf": [{"required": ["email"]}, {"required": ["phone"]}]
            }),
            200,
        );
    }

    #[test]
    fn test_extreme_numeric_ranges() {
        assert_always_valid(json!({"type": "number", "minimum": -1e308, "maximum": 1e308}));
        assert_always_valid(json!({"type": "number", "exclusiveMinimum": -1.7e308, "maximum": 1.7e308}));
        assert_always_valid(json!({"type": "number", "minimum": 1e300}));
        assert_always_valid(json!({"type": "number", "minimum": -1e308, "maximum": 1e308, "multipleOf": 0.5}));
    }

    #[test]
    fn test_fractional_multiple_of() {
        assert_valid_for_seeds(json!({"type": "number", "multipleOf": 0.1, "minimum": 0, "maximum": 1}), 200);
        assert_valid_for_seeds(json!({"type": "number", "multipleOf": 0.25, "minimum": -3, "maximum": 3}), 200);
        assert_valid_for_seeds(json!({"type": "number", "multipleOf": 0.01, "exclusiveMinimum": 0, "maximum": 5}), 200);
    }

    #[test]
    fn test_patterns() {
        assert_always_valid(json!({
            "type": "object",
            "required": ["sku", "code", "slug"],
            "properties": {
                "sku": {"type": "string", "pattern": "^[A-Z]{3}-[0-9]{4}$"},
                "code": {"type": "string", "pattern": "^\\d{3}-\\w{2}$"},
                "slug": {"type": "string", "pattern": "^[a-z]+(-[a-z]+)*$", "minLength": 6, "maxLength": 24}
            }
        }));
        assert_always_valid(json!({"type": "string", "pattern": "ord_[0-9a-f]{8}"}));
    }

    #[test]
    fn test_formats_respect_length() {
        assert_always_valid(json!({"type": "string", "format": "email", "maxLength": 12}));
        assert_always_valid(json!({"type": "string", "format": "email", "minLength": 30}));
        assert_always_valid(json!({"type": "string", "format": "email", "minLength": 8, "maxLength": 9}));
    }

    #[test]
    fn test_ascii_classes() {
        assert_eq!(ascii_classes("^\\d{2}$"), "^[0-9]{2}$");
        assert_eq!(ascii_classes("[\\w.]+"), "[A-Za-z0-9_.]+");
        assert_eq!(ascii_classes("a\\.b"), "a\\.b");
        assert_eq!(strip_anchors("^abc$"), "abc");
        assert_eq!(strip_anchors("cost\\$"), "cost\\$");

        assert_eq!(bound_repetitions("[a-z]+-[0-9]*", 4), "[a-z]{1,4}-[0-9]{0,4}");
        assert_eq!(bound_repetitions("a{2,}b{3}[+*]", 5), "a{2,7}b{3}[+*]");
        assert_eq!(bound_repetitions("\\+x", 5), "\\+x");
    }
}
