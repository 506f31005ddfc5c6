//! Rendering lowered ops to command text.
//!
//! Names exist only here: scoreboard slot N becomes fake player
//! `<scoreboard><N+1>`, entity-attribute objective N becomes
//! `<scoreboard>.e<N+1>`, tag N becomes `<tagprefix>.<suffix>`. Guarded
//! bodies either inline as `execute ... run` prefixes or spill to
//! `<internal>/exec<N>` files, bounded by `max-inline`.

use serde_json::json;

use acacia_core::{EntityObjId, TagId};

use crate::analyzer::LoweredProgram;
use crate::ast::CmpOp;
use crate::config::Config;
use crate::ir::{Cond, FnPath, Op, ScoreRef, SelArg, SelBase, Selector, TextPart};

use super::pack::{Pack, PackFile};

/// Render a lowered program into its final file tree.
pub fn render(lowered: LoweredProgram, config: &Config) -> Pack {
    let mut renderer = Renderer {
        config,
        tag_names: &lowered.tag_names,
        spills: Vec::new(),
        next_exec: 0,
    };

    let mut init_lines = vec![format!(
        "scoreboard objectives add {} dummy",
        config.scoreboard
    )];
    for obj in 0..lowered.entity_obj_count {
        init_lines.push(format!(
            "scoreboard objectives add {} dummy",
            renderer.entity_obj(EntityObjId::from_raw(obj))
        ));
    }
    init_lines.extend(renderer.render_ops(&lowered.init));

    // The entry file runs initialization once, then the top-level code.
    let mut main_lines = vec![format!(
        "function {}",
        renderer.fn_ref(&FnPath::new(config.init_file.clone()))
    )];
    main_lines.extend(renderer.render_ops(&lowered.main));

    let mut files = Vec::new();
    files.push(renderer.pack_file(&config.main_file, main_lines));
    files.push(renderer.pack_file(&config.init_file, init_lines));
    for (path, ops) in &lowered.files {
        let lines = renderer.render_ops(ops);
        files.push(renderer.pack_file(path.as_str(), lines));
    }
    // Guarded bodies spilled during rendering come last; they are already
    // rendered lines.
    let spills = std::mem::take(&mut renderer.spills);
    for (path, lines) in spills {
        files.push(renderer.pack_file(path.as_str(), lines));
    }

    Pack {
        files,
        function_folder: config.function_folder.clone(),
        override_old: config.override_old,
    }
}

struct Renderer<'a> {
    config: &'a Config,
    tag_names: &'a [String],
    spills: Vec<(FnPath, Vec<String>)>,
    next_exec: u32,
}

impl Renderer<'_> {
    fn pack_file(&self, path: &str, lines: Vec<String>) -> PackFile {
        let rel = if self.config.function_folder.is_empty() {
            format!("{path}.mcfunction")
        } else {
            format!("{}/{path}.mcfunction", self.config.function_folder)
        };
        PackFile { path: rel, lines }
    }

    /// The argument of a `function` command.
    fn fn_ref(&self, path: &FnPath) -> String {
        if self.config.function_folder.is_empty() {
            path.as_str().to_string()
        } else {
            format!("{}/{}", self.config.function_folder, path.as_str())
        }
    }

    // ---- names ------------------------------------------------------------

    fn slot(&self, id: acacia_core::SlotId) -> String {
        format!("{}{}", self.config.scoreboard, id.as_u32() + 1)
    }

    fn entity_obj(&self, id: EntityObjId) -> String {
        format!("{}.e{}", self.config.scoreboard, id.as_u32() + 1)
    }

    fn tag(&self, id: TagId) -> String {
        format!(
            "{}.{}",
            self.config.entity_tag_prefix,
            self.tag_names[id.index()]
        )
    }

    fn score_pair(&self, score: &ScoreRef) -> (String, String) {
        match score {
            ScoreRef::Slot(id) => (self.slot(*id), self.config.scoreboard.clone()),
            ScoreRef::Entity { target, obj } => (self.selector(target), self.entity_obj(*obj)),
            ScoreRef::Raw { player, objective } => (player.clone(), objective.clone()),
        }
    }

    fn score(&self, score: &ScoreRef) -> String {
        let (holder, objective) = self.score_pair(score);
        format!("{holder} {objective}")
    }

    fn selector(&self, selector: &Selector) -> String {
        let base = match &selector.base {
            SelBase::Executor => "@s".to_string(),
            SelBase::AllEntities => "@e".to_string(),
            SelBase::Raw(text) => text.clone(),
        };
        if selector.args.is_empty() {
            return base;
        }
        let args: Vec<String> = selector
            .args
            .iter()
            .map(|arg| match arg {
                SelArg::Tag(tag) => format!("tag={}", self.tag(*tag)),
                SelArg::NotTag(tag) => format!("tag=!{}", self.tag(*tag)),
                SelArg::Raw(text) => text.clone(),
            })
            .collect();
        format!("{base}[{}]", args.join(","))
    }

    // ---- ops --------------------------------------------------------------

    fn render_ops(&mut self, ops: &[Op]) -> Vec<String> {
        let mut lines = Vec::new();
        for op in ops {
            self.render_op(op, &mut lines);
        }
        lines
    }

    fn render_op(&mut self, op: &Op, lines: &mut Vec<String>) {
        match op {
            Op::Comment(text) => {
                if self.config.debug_comments {
                    lines.push(format!("# {text}"));
                }
            }
            Op::SetConst { target, value } => {
                lines.push(format!("scoreboard players set {} {value}", self.score(target)));
            }
            Op::AddConst { target, value } => lines.push(self.add_line(target, i64::from(*value))),
            Op::SubConst { target, value } => lines.push(self.add_line(target, -i64::from(*value))),
            Op::ScoreOp { op, target, source } => {
                lines.push(format!(
                    "scoreboard players operation {} {} {}",
                    self.score(target),
                    op.symbol(),
                    self.score(source)
                ));
            }
            Op::TagAdd { target, tag } => {
                lines.push(format!("tag {} add {}", self.selector(target), self.tag(*tag)));
            }
            Op::TagRemove { target, tag } => {
                lines.push(format!(
                    "tag {} remove {}",
                    self.selector(target),
                    self.tag(*tag)
                ));
            }
            Op::Summon {
                entity_type,
                pos,
                tags,
            } => {
                lines.push(format!("summon {entity_type} {pos}"));
                // The first tag marks the fresh instance; the closest entity
                // of that type at the spawn position is it. Later tags ride
                // on the first.
                if let Some((first, rest)) = tags.split_first() {
                    lines.push(format!(
                        "execute positioned {pos} run tag @e[type={entity_type},c=1] add {}",
                        self.tag(*first)
                    ));
                    for tag in rest {
                        lines.push(format!(
                            "tag @e[tag={}] add {}",
                            self.tag(*first),
                            self.tag(*tag)
                        ));
                    }
                }
            }
            Op::Teleport { target, pos } => {
                lines.push(format!("tp {} {pos}", self.selector(target)));
            }
            Op::Kill { target } => lines.push(format!("kill {}", self.selector(target))),
            Op::Raw(text) => lines.push(text.clone()),
            Op::Tellraw { target, parts } => {
                lines.push(format!("tellraw {target} {}", self.rawtext(parts)));
            }
            Op::Titleraw {
                target,
                mode,
                parts,
            } => {
                lines.push(format!("titleraw {target} {mode} {}", self.rawtext(parts)));
            }
            Op::Call(path) => lines.push(format!("function {}", self.fn_ref(path))),
            Op::Guarded { conds, body } => {
                let prefix: Vec<String> = conds.iter().map(|c| self.cond(c)).collect();
                let prefix = format!("execute {} run ", prefix.join(" "));
                self.render_prefixed(prefix, body, lines);
            }
            Op::As { target, body } => {
                let prefix = format!("execute as {} at @s run ", self.selector(target));
                self.render_prefixed(prefix, body, lines);
            }
        }
    }

    /// Inline small bodies behind the execute prefix; spill larger ones to
    /// an internal file. With optimization off, every guarded body spills,
    /// whatever its size.
    fn render_prefixed(&mut self, prefix: String, body: &[Op], lines: &mut Vec<String>) {
        let body_lines = self.render_ops(body);
        if body_lines.is_empty() {
            return;
        }
        let inline =
            self.config.optimize && body_lines.len() <= self.config.max_inline as usize;
        if inline {
            for line in body_lines {
                lines.push(format!("{prefix}{line}"));
            }
        } else {
            self.next_exec += 1;
            let path = FnPath::new(format!(
                "{}/exec{}",
                self.config.internal_folder, self.next_exec
            ));
            lines.push(format!("{prefix}function {}", self.fn_ref(&path)));
            self.spills.push((path, body_lines));
        }
    }

    fn add_line(&self, target: &ScoreRef, value: i64) -> String {
        if value < 0 {
            format!("scoreboard players remove {} {}", self.score(target), -value)
        } else {
            format!("scoreboard players add {} {value}", self.score(target))
        }
    }

    fn cond(&self, cond: &Cond) -> String {
        match cond {
            Cond::Matches {
                score,
                min,
                max,
                negated,
            } => {
                let range = match (min, max) {
                    (Some(a), Some(b)) if a == b => format!("{a}"),
                    (Some(a), Some(b)) => format!("{a}..{b}"),
                    (Some(a), None) => format!("{a}.."),
                    (None, Some(b)) => format!("..{b}"),
                    (None, None) => "-2147483648..2147483647".to_string(),
                };
                format!(
                    "{} score {} matches {range}",
                    keyword(*negated),
                    self.score(score)
                )
            }
            Cond::Compare {
                lhs,
                op,
                rhs,
                negated,
            } => {
                let symbol = match op {
                    CmpOp::Eq => "=",
                    CmpOp::Ne => "=",
                    CmpOp::Lt => "<",
                    CmpOp::Le => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Ge => ">=",
                };
                // `!=` has no execute spelling; it is `unless =`.
                let negated = *negated != (*op == CmpOp::Ne);
                format!(
                    "{} score {} {symbol} {}",
                    keyword(negated),
                    self.score(lhs),
                    self.score(rhs)
                )
            }
            Cond::Entity { selector, negated } => {
                format!("{} entity {}", keyword(*negated), self.selector(selector))
            }
        }
    }

    fn rawtext(&self, parts: &[TextPart]) -> String {
        let components: Vec<serde_json::Value> = parts
            .iter()
            .map(|part| match part {
                TextPart::Text(text) => json!({ "text": text }),
                TextPart::Score(score) => {
                    let (holder, objective) = self.score_pair(score);
                    json!({ "score": { "name": holder, "objective": objective } })
                }
            })
            .collect();
        json!({ "rawtext": components }).to_string()
    }
}

fn keyword(negated: bool) -> &'static str {
    if negated { "unless" } else { "if" }
}
