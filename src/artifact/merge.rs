//! Fragment insertion
//!
//! Fragments arrive with their own default namespace declaration. On import
//! the declaration is dropped when it matches the namespace already in scope
//! at the insertion point, kept when it differs, and an explicit `xmlns=""`
//! is added when the fragment has none but a default namespace is in scope.
//! No deduplication is performed: inserting the same Setting twice yields
//! two siblings.

use super::Artifact;
use crate::error::{ComposeError, Result};
use crate::xml::Element;

impl Artifact {
    /// Append a Setting fragment to the first grouping of the Settings container
    pub fn insert_setting(&mut self, fragment: Element) -> Result<()> {
        let flavor = self.flavor;
        let root = &mut self.document.root;
        let mut scope = in_scope(None, root);

        let flavor_element = root
            .child_mut(flavor.element_name())
            .ok_or_else(|| missing(flavor.element_name()))?;
        scope = in_scope(scope, flavor_element);

        let settings = flavor_element.child_mut("Settings").ok_or_else(|| {
            ComposeError::structural(format!("<{}> has no Settings container", flavor))
        })?;
        scope = in_scope(scope, settings);

        let grouping = settings.first_child_element_mut().ok_or_else(|| {
            ComposeError::structural(format!(
                "Settings container of <{}> has no grouping element",
                flavor
            ))
        })?;
        scope = in_scope(scope, grouping);

        let logical_name = fragment.attribute("LogicalName").map(str::to_string);
        grouping.push_element(import(fragment, scope.as_deref()));

        tracing::debug!(
            flavor = %flavor,
            logical_name = logical_name.as_deref().unwrap_or_default(),
            "Merged setting fragment"
        );
        Ok(())
    }

    /// Append a Rule fragment to the Rules container, creating it if absent
    pub fn insert_rule(&mut self, fragment: Element) -> Result<()> {
        let flavor = self.flavor;
        let root = &mut self.document.root;
        let mut scope = in_scope(None, root);

        let flavor_element = root
            .child_mut(flavor.element_name())
            .ok_or_else(|| missing(flavor.element_name()))?;
        scope = in_scope(scope, flavor_element);

        if flavor_element.child("Rules").is_none() {
            let name = match flavor_element.name().split_once(':') {
                Some((prefix, _)) => format!("{}:Rules", prefix),
                None => "Rules".to_string(),
            };
            flavor_element.push_element(Element::unchecked(name));
            tracing::debug!(flavor = %flavor, "Created Rules container");
        }
        let rules = flavor_element
            .child_mut("Rules")
            .ok_or_else(|| missing("Rules"))?;
        scope = in_scope(scope, rules);

        let rule_id = fragment.attribute("id").map(str::to_string);
        rules.push_element(import(fragment, scope.as_deref()));

        tracing::debug!(
            flavor = %flavor,
            rule_id = rule_id.as_deref().unwrap_or_default(),
            "Merged rule fragment"
        );
        Ok(())
    }
}

fn missing(name: &str) -> ComposeError {
    ComposeError::structural(format!("<{}> element disappeared during merge", name))
}

/// Default namespace in scope inside `element`
fn in_scope(inherited: Option<String>, element: &Element) -> Option<String> {
    match element.default_namespace() {
        Some("") => None,
        Some(ns) => Some(ns.to_string()),
        None => inherited,
    }
}

fn import(mut fragment: Element, scope: Option<&str>) -> Element {
    match (fragment.default_namespace(), scope) {
        (Some(own), Some(scope)) if own == scope => {
            fragment.remove_attribute("xmlns");
        }
        (Some(""), None) => {
            fragment.remove_attribute("xmlns");
        }
        (None, Some(_)) => fragment.declare_default_namespace(""),
        _ => {}
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::error::ErrorClass;
    use crate::rule::RULES_NS;
    use crate::setting::DESIRED_CONFIGURATION_NS;

    fn setting_fragment(name: &str) -> Element {
        Element::build(
            "SimpleSetting",
            &[
                ("xmlns", DESIRED_CONFIGURATION_NS),
                ("LogicalName", name),
                ("DataType", "String"),
            ],
        )
        .unwrap()
    }

    fn rule_fragment(id: &str) -> Element {
        Element::build("Rule", &[("xmlns", RULES_NS), ("id", id)]).unwrap()
    }

    fn rules_containers(artifact: &Artifact) -> usize {
        let mut found = Vec::new();
        artifact.document().root.descendants("Rules", &mut found);
        found.len()
    }

    #[test]
    fn test_setting_lands_in_first_grouping() {
        let mut artifact = Artifact::parse(OPERATING_SYSTEM).unwrap();
        artifact.insert_setting(setting_fragment("RegistrySetting_new")).unwrap();

        assert_eq!(
            artifact.setting_names(),
            vec!["ScriptSetting_existing", "RegistrySetting_new"]
        );
    }

    #[test]
    fn test_redundant_namespace_is_dropped() {
        let mut artifact = Artifact::parse(APPLICATION).unwrap();
        artifact.insert_setting(setting_fragment("S1")).unwrap();

        let xml = artifact.to_xml().unwrap();
        assert!(xml.contains(r#"<SimpleSetting LogicalName="S1" DataType="String"/>"#));
    }

    #[test]
    fn test_foreign_namespace_is_kept() {
        let mut artifact = Artifact::parse(APPLICATION).unwrap();
        artifact.insert_rule(rule_fragment("Rule_1")).unwrap();

        let xml = artifact.to_xml().unwrap();
        assert!(xml.contains(&format!(r#"<Rule xmlns="{}" id="Rule_1"/>"#, RULES_NS)));
    }

    #[test]
    fn test_unqualified_fragment_opts_out_of_default_namespace() {
        let mut artifact = Artifact::parse(APPLICATION).unwrap();
        let fragment = Element::build("SimpleSetting", &[("LogicalName", "bare")]).unwrap();
        artifact.insert_setting(fragment).unwrap();

        let xml = artifact.to_xml().unwrap();
        assert!(xml.contains(r#"<SimpleSetting xmlns="" LogicalName="bare"/>"#));
    }

    #[test]
    fn test_first_rule_creates_single_container() {
        let mut artifact = Artifact::parse(APPLICATION).unwrap();
        assert_eq!(rules_containers(&artifact), 0);

        artifact.insert_rule(rule_fragment("Rule_1")).unwrap();
        assert_eq!(rules_containers(&artifact), 1);
        assert_eq!(artifact.rule_ids(), vec!["Rule_1"]);

        artifact.insert_rule(rule_fragment("Rule_2")).unwrap();
        assert_eq!(rules_containers(&artifact), 1);
        assert_eq!(artifact.rule_ids(), vec!["Rule_1", "Rule_2"]);
    }

    #[test]
    fn test_rule_appends_to_existing_container() {
        let mut artifact = Artifact::parse(OPERATING_SYSTEM).unwrap();
        artifact.insert_rule(rule_fragment("Rule_new")).unwrap();
        assert_eq!(rules_containers(&artifact), 1);
        assert_eq!(artifact.rule_ids(), vec!["Rule_existing", "Rule_new"]);
    }

    #[test]
    fn test_created_container_keeps_flavor_prefix() {
        let mut artifact = Artifact::parse(
            r#"<dc:DesiredConfigurationDigest xmlns:dc="urn:dc"><dc:Application><dc:Settings><dc:RootComplexSetting/></dc:Settings></dc:Application></dc:DesiredConfigurationDigest>"#,
        )
        .unwrap();
        artifact.insert_rule(rule_fragment("Rule_1")).unwrap();
        assert!(artifact.to_xml().unwrap().contains("<dc:Rules>"));
        assert_eq!(artifact.rule_ids(), vec!["Rule_1"]);
    }

    #[test]
    fn test_missing_grouping_is_structural() {
        let mut artifact = Artifact::parse(
            "<DesiredConfigurationDigest><Application><Settings/></Application></DesiredConfigurationDigest>",
        )
        .unwrap();
        let err = artifact.insert_setting(setting_fragment("S")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Structural);

        let mut artifact = Artifact::parse(
            "<DesiredConfigurationDigest><Application/></DesiredConfigurationDigest>",
        )
        .unwrap();
        assert!(artifact.insert_setting(setting_fragment("S")).is_err());
    }

    #[test]
    fn test_same_fragment_twice_gives_two_siblings() {
        let mut artifact = Artifact::parse(APPLICATION).unwrap();
        artifact.insert_setting(setting_fragment("dup")).unwrap();
        artifact.insert_setting(setting_fragment("dup")).unwrap();
        assert_eq!(artifact.setting_names(), vec!["dup", "dup"]);
    }
}
