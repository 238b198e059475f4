//! Rendering of the collected scope into configuration text: the naming
//! pass, reference substitution, variable extraction for unreadable
//! values, companion artifacts, and import statements.

use std::cell::RefCell;
use std::collections::HashMap;

use dbex_domain::{
    render_block, HclBlock, HclValue, NameRegistry, ResourceDescriptor, ResourceKind,
    RenderOptions,
};
use indexmap::IndexMap;
use serde_json::Value;

use crate::scope::Warning;

/// Attribute paths that refer to another exportable resource. When the
/// referent is present in scope with an assigned name, the literal id is
/// replaced by an expression; otherwise the literal stays and a warning is
/// recorded. Job-to-job references are legitimate cycles and resolve fine
/// because every resource is named before any block is rendered.
struct RefRule {
    owner: ResourceKind,
    path_suffix: &'static str,
    target: ResourceKind,
    target_attr: &'static str,
}

const REF_RULES: &[RefRule] = &[
    RefRule {
        owner: ResourceKind::Cluster,
        path_suffix: "policy_id",
        target: ResourceKind::ClusterPolicy,
        target_attr: "id",
    },
    RefRule {
        owner: ResourceKind::Job,
        path_suffix: "policy_id",
        target: ResourceKind::ClusterPolicy,
        target_attr: "id",
    },
    RefRule {
        owner: ResourceKind::Job,
        path_suffix: "existing_cluster_id",
        target: ResourceKind::Cluster,
        target_attr: "id",
    },
    RefRule {
        owner: ResourceKind::Job,
        path_suffix: "run_job_task.job_id",
        target: ResourceKind::Job,
        target_attr: "id",
    },
    RefRule {
        owner: ResourceKind::Job,
        path_suffix: "pipeline_task.pipeline_id",
        target: ResourceKind::Pipeline,
        target_attr: "id",
    },
    RefRule {
        owner: ResourceKind::Job,
        path_suffix: "notebook_task.notebook_path",
        target: ResourceKind::Notebook,
        target_attr: "path",
    },
    RefRule {
        owner: ResourceKind::Pipeline,
        path_suffix: "notebook.path",
        target: ResourceKind::Notebook,
        target_attr: "path",
    },
];

fn rule_for(owner: ResourceKind, path: &str) -> Option<&'static RefRule> {
    REF_RULES.iter().find(|rule| {
        rule.owner == owner
            && (path == rule.path_suffix || path.ends_with(&format!(".{}", rule.path_suffix)))
    })
}

/// Everything the run needs to write to disk.
pub(crate) struct Emission {
    /// file group (e.g. "compute") → [(block key, block text)].
    pub blocks: IndexMap<String, Vec<(String, String)>>,
    /// `variable` blocks destined for vars.tf, keyed by variable name.
    pub variables: Vec<(String, String)>,
    /// `terraform import` shell lines.
    pub import_lines: Vec<String>,
    /// Native `import {}` blocks, populated when requested.
    pub import_blocks: Vec<(String, String)>,
    /// Relative path → file contents (notebook sources, dashboard JSON).
    pub companions: Vec<(String, Vec<u8>)>,
    pub warnings: Vec<Warning>,
}

pub(crate) fn emit(
    descriptors: &mut [ResourceDescriptor],
    native_import: bool,
    options: RenderOptions,
) -> Emission {
    // Naming pass over the whole scope first, so mutual references all
    // resolve regardless of emission order.
    let mut registry = NameRegistry::new();
    for descriptor in descriptors.iter_mut() {
        let namespace = descriptor.key.kind.to_string();
        let assigned = registry.assign(
            &namespace,
            &descriptor.display_name,
            &descriptor.key.id,
        );
        descriptor.assigned_name = Some(assigned);
    }

    let mut lookup: HashMap<(ResourceKind, &str), &str> = HashMap::new();
    for descriptor in descriptors.iter() {
        if let Some(name) = descriptor.assigned_name.as_deref() {
            lookup.insert((descriptor.key.kind, descriptor.key.id.as_str()), name);
        }
    }

    let warnings = RefCell::new(Vec::new());
    let mut emission = Emission {
        blocks: IndexMap::new(),
        variables: Vec::new(),
        import_lines: Vec::new(),
        import_blocks: Vec::new(),
        companions: Vec::new(),
        warnings: Vec::new(),
    };

    for descriptor in descriptors.iter() {
        let kind = descriptor.key.kind;
        let name = descriptor
            .assigned_name
            .as_deref()
            .unwrap_or_default()
            .to_string();
        let address = format!("{}.{name}", kind.terraform_type());

        let block = match kind {
            ResourceKind::Notebook => notebook_block(descriptor, &name, &mut emission),
            ResourceKind::Dashboard => dashboard_block(descriptor, &name, &mut emission),
            ResourceKind::Secret => secret_block(descriptor, &name, &lookup, &mut emission),
            _ => {
                let resolve = |path: &str, value: &Value| -> Option<HclValue> {
                    let rule = rule_for(kind, path)?;
                    let id = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    match lookup.get(&(rule.target, id.as_str())) {
                        Some(target_name) => Some(HclValue::Expr(format!(
                            "{}.{target_name}.{}",
                            rule.target.terraform_type(),
                            rule.target_attr
                        ))),
                        None => {
                            warnings.borrow_mut().push(Warning {
                                kind: Some(kind),
                                message: format!(
                                    "{address}: {path} refers to unknown {} {id}, keeping literal",
                                    rule.target
                                ),
                            });
                            None
                        }
                    }
                };
                match descriptor.payload.as_object() {
                    Some(map) => HclBlock::from_json(map, "", &resolve),
                    None => HclBlock::new(),
                }
            }
        };

        let header = format!("resource \"{}\" \"{name}\"", kind.terraform_type());
        let text = render_block(&header, &block, options);
        emission
            .blocks
            .entry(kind.file_group().to_string())
            .or_default()
            .push((header, text));

        emission
            .import_lines
            .push(format!("terraform import {address} \"{}\"", descriptor.key.id));
        if native_import {
            let block_text = format!(
                "import {{\n  id = \"{}\"\n  to = {address}\n}}\n",
                descriptor.key.id
            );
            emission.import_blocks.push((address.clone(), block_text));
        }
    }

    emission.warnings.append(&mut warnings.into_inner());
    emission
}

/// Notebook source lands next to the configuration; the block points at it
/// with a module-relative path.
fn notebook_block(
    descriptor: &ResourceDescriptor,
    name: &str,
    emission: &mut Emission,
) -> HclBlock {
    let payload = &descriptor.payload;
    let language = payload["language"].as_str().unwrap_or("PYTHON");
    let source = payload["source"].as_str().unwrap_or_default();
    let file_name = format!("{name}.{}", notebook_extension(language));
    emission
        .companions
        .push((format!("notebooks/{file_name}"), source.as_bytes().to_vec()));

    let mut block = HclBlock::new();
    block.set(
        "source",
        HclValue::Template(format!("${{path.module}}/notebooks/{file_name}")),
    );
    block.set(
        "path",
        HclValue::Str(payload["path"].as_str().unwrap_or_default().to_string()),
    );
    block.set("language", HclValue::Str(language.to_string()));
    block
}

fn notebook_extension(language: &str) -> &'static str {
    match language {
        "SQL" => "sql",
        "SCALA" => "scala",
        "R" => "r",
        _ => "py",
    }
}

fn dashboard_block(
    descriptor: &ResourceDescriptor,
    name: &str,
    emission: &mut Emission,
) -> HclBlock {
    let payload = &descriptor.payload;
    let file_name = format!("{name}.lvdash.json");
    let serialized = payload["serialized_dashboard"].as_str().unwrap_or_default();
    emission.companions.push((
        format!("dashboards/{file_name}"),
        serialized.as_bytes().to_vec(),
    ));

    let mut block = HclBlock::new();
    block.set(
        "display_name",
        HclValue::Str(payload["display_name"].as_str().unwrap_or_default().to_string()),
    );
    if let Some(parent) = payload["parent_path"].as_str() {
        block.set("parent_path", HclValue::Str(parent.to_string()));
    }
    if let Some(warehouse) = payload["warehouse_id"].as_str() {
        block.set("warehouse_id", HclValue::Str(warehouse.to_string()));
    }
    block.set(
        "file_path",
        HclValue::Template(format!("${{path.module}}/dashboards/{file_name}")),
    );
    block
}

/// Secret values cannot be read back through the API, so the block takes
/// its value from an input variable declared in vars.tf.
fn secret_block(
    descriptor: &ResourceDescriptor,
    name: &str,
    lookup: &HashMap<(ResourceKind, &str), &str>,
    emission: &mut Emission,
) -> HclBlock {
    let payload = &descriptor.payload;
    let scope_id = payload["scope"].as_str().unwrap_or_default();
    let key = payload["key"].as_str().unwrap_or_default();

    let variable = format!("string_value_{name}");
    emission.variables.push((
        variable.clone(),
        format!("variable \"{variable}\" {{\n  description = \"\"\n  sensitive   = true\n}}\n"),
    ));

    let mut block = HclBlock::new();
    block.set("key", HclValue::Str(key.to_string()));
    match lookup.get(&(ResourceKind::SecretScope, scope_id)) {
        Some(scope_name) => block.set(
            "scope",
            HclValue::Expr(format!("databricks_secret_scope.{scope_name}.name")),
        ),
        None => block.set("scope", HclValue::Str(scope_id.to_string())),
    }
    block.set("string_value", HclValue::Expr(format!("var.{variable}")));
    block
}
