// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folder rows. The classifier only ever sees the auto-classify subset.

use comptoir_core::ComptoirError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Folder;

const SELECT_COLUMNS: &str = "folder_id, company_id, name, is_system, auto_classify, ai_context";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Folder, rusqlite::Error> {
    Ok(Folder {
        folder_id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        is_system: row.get(3)?,
        auto_classify: row.get(4)?,
        ai_context: row.get(5)?,
    })
}

pub async fn insert(db: &Database, folder: &Folder) -> Result<(), ComptoirError> {
    let folder = folder.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO folders (folder_id, company_id, name, is_system, auto_classify,
                     ai_context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    folder.folder_id,
                    folder.company_id,
                    folder.name,
                    folder.is_system,
                    folder.auto_classify,
                    folder.ai_context,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Folders the AI classifier may route into, ordered by name for a stable
/// prompt layout.
pub async fn list_auto_classify(
    db: &Database,
    company_id: &str,
) -> Result<Vec<Folder>, ComptoirError> {
    let company_id = company_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM folders
                 WHERE company_id = ?1 AND auto_classify = 1 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![company_id], map_row)?;
            let mut folders = Vec::new();
            for row in rows {
                folders.push(row?);
            }
            Ok(folders)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_folder(id: &str, name: &str, auto_classify: bool) -> Folder {
        Folder {
            folder_id: id.to_string(),
            company_id: "co-1".to_string(),
            name: name.to_string(),
            is_system: false,
            auto_classify,
            ai_context: format!("Conversations about {name}"),
        }
    }

    #[tokio::test]
    async fn list_auto_classify_filters_and_sorts() {
        let db = setup_db().await;
        insert(&db, &make_folder("f-1", "Urgences", true)).await.unwrap();
        insert(&db, &make_folder("f-2", "Archives", false)).await.unwrap();
        insert(&db, &make_folder("f-3", "Devis", true)).await.unwrap();

        let mut other_company = make_folder("f-4", "Devis", true);
        other_company.company_id = "co-2".to_string();
        insert(&db, &other_company).await.unwrap();

        let folders = list_auto_classify(&db, "co-1").await.unwrap();
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Devis", "Urgences"]);
        assert!(folders.iter().all(|f| f.auto_classify));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ai_context_rides_along() {
        let db = setup_db().await;
        insert(&db, &make_folder("f-1", "Devis", true)).await.unwrap();

        let folders = list_auto_classify(&db, "co-1").await.unwrap();
        assert_eq!(folders[0].ai_context, "Conversations about Devis");

        db.close().await.unwrap();
    }
}
