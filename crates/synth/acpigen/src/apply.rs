//! Folding generator output into `config.plist`.

use plist::{Dictionary, Value};

use ocforge_acpi::{AddEntry, DeleteEntry, Patch};

use crate::result::AcpiOutput;

fn integer(n: impl Into<i64>) -> Value {
    let n: i64 = n.into();
    Value::Integer(n.into())
}

/// Sub-dictionary `key` of `parent`, created (or replaced, if it holds
/// something else) as needed.
fn section<'a>(parent: &'a mut Dictionary, key: &str) -> &'a mut Dictionary {
    if !matches!(parent.get(key), Some(Value::Dictionary(_))) {
        parent.insert(key.to_string(), Value::Dictionary(Dictionary::new()));
    }
    match parent.get_mut(key) {
        Some(Value::Dictionary(dict)) => dict,
        _ => unreachable!("section inserted above"),
    }
}

fn add_entry(add: &AddEntry) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("Comment".into(), Value::String(add.comment.clone()));
    dict.insert("Enabled".into(), Value::Boolean(add.enabled));
    dict.insert("Path".into(), Value::String(add.path.clone()));
    Value::Dictionary(dict)
}

fn delete_entry(delete: &DeleteEntry) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("All".into(), Value::Boolean(delete.all));
    dict.insert("Comment".into(), Value::String(delete.comment.clone()));
    dict.insert("Enabled".into(), Value::Boolean(delete.enabled));
    dict.insert("OemTableId".into(), Value::Data(delete.oem_table_id.to_vec()));
    dict.insert("TableLength".into(), integer(delete.table_length));
    dict.insert("TableSignature".into(), Value::Data(delete.table_signature.to_vec()));
    Value::Dictionary(dict)
}

fn patch_entry(patch: &Patch) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("Base".into(), Value::String(String::new()));
    dict.insert("BaseSkip".into(), integer(0));
    dict.insert("Comment".into(), Value::String(patch.comment.clone()));
    dict.insert("Count".into(), integer(patch.count));
    dict.insert("Enabled".into(), Value::Boolean(patch.enabled));
    dict.insert("Find".into(), Value::Data(patch.find.clone()));
    dict.insert("Limit".into(), integer(patch.limit));
    dict.insert("Mask".into(), Value::Data(patch.mask.clone()));
    dict.insert("OemTableId".into(), Value::Data(patch.oem_table_id.map(|id| id.to_vec()).unwrap_or_default()));
    dict.insert("Replace".into(), Value::Data(patch.replace.clone()));
    dict.insert("ReplaceMask".into(), Value::Data(patch.replace_mask.clone()));
    dict.insert("Skip".into(), integer(patch.skip));
    dict.insert("TableLength".into(), integer(0));
    dict.insert(
        "TableSignature".into(),
        Value::Data(patch.table_signature.map(|sig| sig.to_vec()).unwrap_or_default()),
    );
    Value::Dictionary(dict)
}

/// Patches in the order they are written: prerequisite renames first, then
/// by comment. The sort is stable, so equal keys keep generation order.
#[must_use]
pub fn ordered_patches(patches: &[Patch]) -> Vec<&Patch> {
    let mut sorted: Vec<&Patch> = patches.iter().collect();
    sorted.sort_by(|a, b| (a.rank, &a.comment).cmp(&(b.rank, &b.comment)));
    sorted
}

/// Replaces `ACPI.Add`, `ACPI.Delete` and `ACPI.Patch` in `config` with the
/// generator output.
pub fn apply_acpi_patches(config: &mut Dictionary, output: &AcpiOutput) {
    let acpi = section(config, "ACPI");
    acpi.insert("Add".into(), Value::Array(output.add.iter().map(add_entry).collect()));
    acpi.insert("Delete".into(), Value::Array(output.delete.iter().map(delete_entry).collect()));
    acpi.insert(
        "Patch".into(),
        Value::Array(ordered_patches(&output.patch).into_iter().map(patch_entry).collect()),
    );
    log::debug!(
        "ACPI: {} add, {} delete, {} patch entries",
        output.add.len(),
        output.delete.len(),
        output.patch.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(comment: &str, rank: u8) -> Patch {
        Patch { rank, ..Patch::new(comment, b"ABCD".to_vec(), b"WXYZ".to_vec()).unwrap() }
    }

    fn comments(config: &Dictionary) -> Vec<String> {
        let acpi = config.get("ACPI").and_then(Value::as_dictionary).unwrap();
        acpi.get("Patch")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .map(|p| p.as_dictionary().and_then(|d| d.get("Comment")).and_then(Value::as_string).unwrap().to_string())
            .collect()
    }

    #[test]
    fn prerequisites_sort_first_then_by_comment() {
        let output = AcpiOutput {
            patch: vec![patch("_OSI to XOSI", 1), patch("EC _STA to XSTA Rename", 1), patch("OSID to XSID", 0), patch("EC to EC0", 0)],
            ..AcpiOutput::default()
        };
        let mut config = Dictionary::new();
        apply_acpi_patches(&mut config, &output);
        assert_eq!(comments(&config), ["EC to EC0", "OSID to XSID", "EC _STA to XSTA Rename", "_OSI to XOSI"]);
    }

    #[test]
    fn patch_entries_carry_every_key() {
        let output = AcpiOutput {
            patch: vec![patch("rename", 1).in_table(*b"DSDT").disabled()],
            add: vec![AddEntry { comment: "SSDT-EC".into(), enabled: true, path: "SSDT-EC.aml".into() }],
            ..AcpiOutput::default()
        };
        let mut config = Dictionary::new();
        config.insert("ACPI".into(), Value::String("garbage".into()));
        apply_acpi_patches(&mut config, &output);

        let acpi = config.get("ACPI").and_then(Value::as_dictionary).unwrap();
        let entry = acpi.get("Patch").and_then(Value::as_array).unwrap()[0].as_dictionary().unwrap();
        let field = |key: &str| entry.get(key).unwrap();
        let keys: Vec<&str> = entry.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "Base", "BaseSkip", "Comment", "Count", "Enabled", "Find", "Limit", "Mask", "OemTableId", "Replace",
                "ReplaceMask", "Skip", "TableLength", "TableSignature"
            ]
        );
        assert_eq!(field("Enabled").as_boolean(), Some(false));
        assert_eq!(field("Find").as_data(), Some(&b"ABCD"[..]));
        assert_eq!(field("TableSignature").as_data(), Some(&b"DSDT"[..]));
        assert_eq!(field("OemTableId").as_data(), Some(&[][..]));

        let add = acpi.get("Add").and_then(Value::as_array).unwrap()[0].as_dictionary().unwrap();
        assert_eq!(add.get("Path").and_then(Value::as_string), Some("SSDT-EC.aml"));
        assert!(acpi.get("Delete").and_then(Value::as_array).unwrap().is_empty());
    }
}
