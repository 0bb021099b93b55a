//! Document commands: list, show and new.

use docbranch::{InMemoryRemote, Store};

use super::CommandResult;
use crate::cli::{DocArgs, NewArgs};
use crate::output::{OutputFormat, describe_field, origin_of, print_table};

/// Run the `list` command
pub async fn list(remote: &InMemoryRemote, store: &Store, format: OutputFormat) -> CommandResult {
    let docs = store.get_docs(&remote.ids()).await?;
    let mut docs: Vec<_> = docs.into_values().collect();
    docs.sort_by(|a, b| a.id().cmp(b.id()));

    match format {
        OutputFormat::Human => {
            if docs.is_empty() {
                println!("No documents found.");
                return Ok(false);
            }
            let rows: Vec<Vec<String>> = docs
                .iter()
                .map(|doc| {
                    vec![
                        doc.id().to_string(),
                        store.layout_key(doc),
                        doc.keys().len().to_string(),
                        origin_of(doc),
                    ]
                })
                .collect();
            print_table(&["ID", "LAYOUT", "FIELDS", "BRANCH OF"], &rows);
        }
        OutputFormat::Json => {
            let entries: Vec<_> = docs
                .iter()
                .map(|doc| {
                    serde_json::json!({
                        "id": doc.id().as_str(),
                        "layoutKey": store.layout_key(doc),
                        "fields": doc.keys().len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string(&entries)?);
        }
    }
    Ok(false)
}

/// Run the `show` command
pub async fn show(args: &DocArgs, store: &Store, format: OutputFormat) -> CommandResult {
    let doc = store.require_doc(&args.id).await?;
    store.resolve_placeholders(&doc).await?;

    match format {
        OutputFormat::Human => {
            println!("Document:  {}", doc.id());
            let rows: Vec<Vec<String>> = doc
                .keys()
                .into_iter()
                .filter_map(|key| {
                    let field = doc.field(&key)?;
                    Some(vec![key, field.type_name().to_string(), describe_field(&field)])
                })
                .collect();
            print_table(&["KEY", "TYPE", "VALUE"], &rows);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&doc.snapshot())?),
    }
    Ok(false)
}

/// Run the `new` command
pub async fn new(args: &NewArgs, store: &Store, format: OutputFormat) -> CommandResult {
    let parent = match &args.parent {
        Some(id) => Some(store.require_doc(id).await?),
        None => None,
    };

    let doc = store.create_doc();
    for (key, value) in &args.fields {
        store.set_stamped(&doc, key, value.as_str());
    }
    if let Some(parent) = &parent {
        let key = store.layout_key(parent);
        parent.add_child(&key, &doc)?;
        store.stamp(parent, &key);
    }

    match format {
        OutputFormat::Human => println!("Created document {}", doc.id()),
        OutputFormat::Json => println!("{}", serde_json::to_string(&doc.snapshot())?),
    }
    Ok(true)
}
