//! Introspection of a dispatcher's component tree and handler tables.

use std::collections::HashSet;
use std::fmt::Write;

use super::dispatcher::Dispatcher;
use super::types::Matcher;
use crate::common::types::ComponentId;

impl Dispatcher {
    /// Walk managers upwards to the top-level component.
    pub fn root(&self, id: ComponentId) -> ComponentId {
        let mut current = id;
        let mut seen = HashSet::new();
        while let Some(manager) = self.component(current).and_then(|info| info.manager) {
            if !seen.insert(current) {
                break;
            }
            current = manager;
        }
        current
    }

    /// Render the component tree below `root`, one component per line.
    pub fn graph(&self, root: ComponentId) -> String {
        let mut lines = Vec::new();
        let mut visited = HashSet::new();
        self.walk(root, 0, &mut visited, &mut lines);
        lines.join("\n")
    }

    fn walk(
        &self,
        id: ComponentId,
        depth: usize,
        visited: &mut HashSet<ComponentId>,
        lines: &mut Vec<String>,
    ) {
        lines.push(format!("{}* {}", " ".repeat(depth), self.describe(id)));
        for child in self.children(id) {
            if visited.insert(child) {
                self.walk(child, depth + 1, visited, lines);
            }
        }
    }

    /// Short display form of a component.
    pub fn describe(&self, id: ComponentId) -> String {
        match self.component(id) {
            Some(info) => format!("{}<{}> {}", info.name, info.channel, id),
            None => format!("<unregistered> {}", id),
        }
    }

    /// A report of every registered component and handler.
    pub fn inspect(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, " Registered Components: {}", self.order.len());
        for id in &self.order {
            let _ = writeln!(out, "  {}", self.describe(*id));
        }
        out.push('\n');

        let mut channels: Vec<&String> = self.channels.keys().collect();
        channels.sort();

        let _ = writeln!(out, " Channels and Event Handlers: {}", channels.len());
        for channel in channels {
            let registrations = &self.channels[channel];
            let _ = writeln!(out, "  {}; {}", channel, registrations.len());
            for reg in registrations {
                let _ = writeln!(
                    out,
                    "   <handler {} {{owner: {}, events: {}}}>",
                    reg.id,
                    reg.owner,
                    describe_matcher(&reg.matcher)
                );
            }
        }

        out
    }
}

fn describe_matcher(matcher: &Matcher) -> String {
    match matcher {
        Matcher::All => "*".to_string(),
        Matcher::Kinds(kinds) => kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(","),
        Matcher::Names(names) => names.join(","),
    }
}
