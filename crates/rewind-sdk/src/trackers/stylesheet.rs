//! CSSOM rule changes.
//!
//! A rule is addressed by its index in the sheet when it is top level and
//! by an index path through the enclosing grouping rules otherwise:
//!
//! ```text
//! sheet
//!  ├─ 0: body { }
//!  └─ 1: @media print
//!        ├─ 0: p { }
//!        └─ 1: @supports (display: grid)
//!              └─ 0: .grid { }          path [1, 1, 0]
//! ```

use rewind_core::dom::{Dom, RuleKey, RuleParent, SheetKey};
use rewind_core::record::{NodeId, RuleIndex, StyleSheetAddRule, StyleSheetDeleteRule, StyleSheetRuleData};
use rewind_snapshot::RecordingContext;

/// Payload for a rule inserted at `index` under `parent`.
pub fn rule_inserted(
    dom: &Dom,
    ctx: &RecordingContext,
    parent: RuleParent,
    index: usize,
    rule: RuleKey,
) -> Option<StyleSheetRuleData> {
    let (sheet, index) = locate(dom, parent, index)?;
    Some(StyleSheetRuleData {
        id: owner_id(dom, ctx, sheet)?,
        adds: Some(vec![StyleSheetAddRule {
            rule: dom.rule_css_text(rule),
            index,
        }]),
        removes: None,
    })
}

/// Payload for the rule deleted at `index` under `parent`.
pub fn rule_deleted(dom: &Dom, ctx: &RecordingContext, parent: RuleParent, index: usize) -> Option<StyleSheetRuleData> {
    let (sheet, index) = locate(dom, parent, index)?;
    Some(StyleSheetRuleData {
        id: owner_id(dom, ctx, sheet)?,
        adds: None,
        removes: Some(vec![StyleSheetDeleteRule { index }]),
    })
}

/// Index path from the sheet down to `rule`, or `None` when a link of
/// the chain is gone.
pub fn rule_path(dom: &Dom, rule: RuleKey) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = rule;
    loop {
        let css_rule = dom.rule(current)?;
        let parent = match css_rule.parent_rule {
            Some(parent_rule) => RuleParent::Rule(parent_rule),
            None => RuleParent::Sheet(css_rule.parent_sheet),
        };
        let siblings = dom.rule_list(parent).ok()?;
        path.push(siblings.iter().position(|r| *r == current)?);
        match css_rule.parent_rule {
            Some(parent_rule) => current = parent_rule,
            None => break,
        }
    }
    path.reverse();
    Some(path)
}

fn locate(dom: &Dom, parent: RuleParent, index: usize) -> Option<(SheetKey, RuleIndex)> {
    match parent {
        RuleParent::Sheet(sheet) => Some((sheet, RuleIndex::Flat(index))),
        RuleParent::Rule(group) => {
            let sheet = dom.rule(group)?.parent_sheet;
            let mut path = rule_path(dom, group)?;
            path.push(index);
            Some((sheet, RuleIndex::Path(path)))
        }
    }
}

/// Changes are only recorded for sheets whose owner node was serialized.
fn owner_id(dom: &Dom, ctx: &RecordingContext, sheet: SheetKey) -> Option<NodeId> {
    let owner = dom.sheet(sheet)?.owner?;
    ctx.ids.get(owner)
}
