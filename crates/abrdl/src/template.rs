// References:
// 1. https://github.com/clitic/vsd/blob/30ca1985e4a467ea3304b11c08d3176deaafd22a/vsd/src/dash/template.rs
// 2. https://github.com/emarsden/dash-mpd-rs/blob/6ebdfb4759adbda8233b5b3520804e23ff86e7de/src/fetch.rs#L435-L466

use regex::{Regex, Replacer};
use std::{collections::HashMap, sync::LazyLock};

// Only the plain form of each identifier is recognized. Width-formatted identifiers such as
// `$Number%06d$` do not match and are therefore kept verbatim, like any other unknown token.
//
// Example template: "$RepresentationID$/seg-$Number$.m4s"
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(RepresentationID|Number|Bandwidth)\$").unwrap());

pub struct Template<'a> {
    args: HashMap<&'a str, String>,
}

impl Template<'_> {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const NUMBER: &'static str = "Number";
    pub const BANDWIDTH: &'static str = "Bandwidth";

    pub fn new() -> Self {
        Self {
            args: HashMap::with_capacity(3),
        }
    }

    pub fn insert(&mut self, key: &'static str, value: String) {
        self.args.insert(key, value);
    }

    /// Replaces every occurrence of every known identifier in one pass.
    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(&self.args))
            .to_string()
    }

    /// Whether `template` contains the plain `$key$` identifier.
    pub fn contains(template: &str, key: &str) -> bool {
        template.contains(&format!("${key}$"))
    }
}

impl Default for Template<'_> {
    fn default() -> Self {
        Self::new()
    }
}

struct TemplateReplacer<'a>(&'a HashMap<&'a str, String>);

impl Replacer for TemplateReplacer<'_> {
    fn replace_append(&mut self, caps: &regex::Captures<'_>, dst: &mut String) {
        let key = &caps[1];
        match self.0.get(key) {
            Some(value) => dst.push_str(value),
            None => dst.push_str(&caps[0]),
        }
    }
}
