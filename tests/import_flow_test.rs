use anyhow::Result;
use roster_import::domain::model::{ConflictType, MembershipType, ValidationErrorType};
use roster_import::{
    BatchImportService, ConflictResolution, ExecuteRequest, ImportError, ImportWizard,
    InMemoryDirectory, RosterFile, StepKind,
};
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::{SimpleFileOptions, ZipWriter};

type Service = BatchImportService<Arc<InMemoryDirectory>, Arc<InMemoryDirectory>>;

fn service() -> (Arc<InMemoryDirectory>, Service) {
    let backend = Arc::new(InMemoryDirectory::new());
    let service = BatchImportService::new(backend.clone(), backend.clone());
    (backend, service)
}

/// Workbook with inline-string cells only; `None` leaves the cell out.
fn xlsx(rows: &[&[Option<&str>]]) -> Result<Vec<u8>> {
    let mut sheet = String::from("<worksheet><sheetData>");
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                let column = (b'A' + c as u8) as char;
                sheet.push_str(&format!(
                    "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    column,
                    r + 1,
                    value
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    workbook(&sheet)
}

fn workbook(sheet_xml: &str) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("xl/worksheets/sheet1.xml", SimpleFileOptions::default())?;
    zip.write_all(sheet_xml.as_bytes())?;
    Ok(zip.finish()?.into_inner())
}

fn media_worship_xlsx() -> Result<RosterFile> {
    Ok(RosterFile::new(
        "roster.xlsx",
        xlsx(&[
            &[Some("Media"), Some("Worship")],
            &[Some("John"), Some("Sarah")],
            &[Some("Alice"), Some("John")],
        ])?,
    ))
}

#[tokio::test]
async fn test_clean_roster_creates_everything_it_previews() -> Result<()> {
    let (backend, service) = service();
    let file = RosterFile::new(
        "roster.csv",
        "Media,Worship,Hospitality\nJohn,Sarah,Grace\nAlice,Mark,Peter\nBen,,Ruth\n",
    );
    let mut wizard = ImportWizard::new();

    wizard.upload(&service, &file).await?;
    assert_eq!(wizard.step().kind(), StepKind::Preview);
    let preview = wizard.step().preview().cloned().expect("preview after upload");
    assert!(preview.conflicts.is_empty());
    assert_eq!(preview.total_departments, 3);
    assert_eq!(preview.total_volunteers, 8);

    let result = wizard.execute(&service).await?;

    assert!(result.success);
    assert_eq!(result.departments_created, preview.total_departments);
    assert_eq!(result.volunteers_created, preview.total_volunteers);
    assert_eq!(result.volunteers_reused, 0);
    assert_eq!(backend.departments().len(), preview.total_departments);
    assert_eq!(backend.volunteers().len(), preview.total_volunteers);
    Ok(())
}

#[tokio::test]
async fn test_create_multiple_never_duplicates_a_roster_name() -> Result<()> {
    let (backend, service) = service();
    let file = RosterFile::new(
        "roster.csv",
        "Media,Worship\nJohn,Sarah\n,John\n,John (Media)\n",
    );

    let preview = service.preview(&file).await?;
    assert!(!preview.has_validation_errors(), "{:?}", preview.validation_errors);
    let result = service
        .execute(&ExecuteRequest {
            session_id: preview.session_id.clone().unwrap_or_default(),
            resolutions: vec![ConflictResolution::create_multiple("John")],
        })
        .await?;

    assert_eq!(result.volunteers_created, 4);
    let mut names: Vec<_> = backend.volunteers().into_iter().map(|v| v.name).collect();
    names.sort();
    assert_eq!(names, ["John (Media #1)", "John (Media)", "John (Worship)", "Sarah"]);
    Ok(())
}

#[tokio::test]
async fn test_wizard_imports_xlsx_with_create_multiple() -> Result<()> {
    let (backend, service) = service();
    let mut wizard = ImportWizard::new();

    wizard.upload(&service, &media_worship_xlsx()?).await?;
    assert_eq!(wizard.step().kind(), StepKind::Conflicts);

    wizard.set_resolution(ConflictResolution::create_multiple("John"))?;
    wizard.go_to_preview()?;
    let result = wizard.execute(&service).await?;

    assert!(result.success);
    assert_eq!(result.departments_created, 2);
    assert_eq!(result.volunteers_created, 4);
    assert_eq!(result.volunteers_reused, 0);

    let mut names: Vec<_> = backend.volunteers().into_iter().map(|v| v.name).collect();
    names.sort();
    assert_eq!(names, ["Alice", "John (Media)", "John (Worship)", "Sarah"]);
    Ok(())
}

#[tokio::test]
async fn test_reuse_existing_volunteer_across_import() -> Result<()> {
    let (backend, service) = service();
    let sarah = backend.seed_volunteer("Sarah");

    let preview = service
        .preview(&RosterFile::new("roster.csv", "Worship\nSarah\nMark\n"))
        .await?;
    let conflict = preview.conflict("Sarah").expect("Sarah should conflict");
    assert_eq!(conflict.conflict_type, ConflictType::ExistingInDb);
    assert_eq!(
        conflict.existing_volunteer.as_ref().map(|v| v.id.as_str()),
        Some(sarah.id.as_str())
    );

    let result = service
        .execute(&ExecuteRequest {
            session_id: preview.session_id.clone().unwrap_or_default(),
            resolutions: vec![ConflictResolution::reuse_existing("Sarah", &sarah.id)],
        })
        .await?;

    assert_eq!(result.volunteers_created, 1);
    assert_eq!(result.volunteers_reused, 1);
    let worship = &backend.departments()[0];
    assert_eq!(worship.volunteer_members[0].volunteer_id, sarah.id);
    assert_eq!(worship.volunteer_members[0].membership_type, MembershipType::Head);
    Ok(())
}

#[tokio::test]
async fn test_sparse_xlsx_reports_validation_errors() -> Result<()> {
    let (_, service) = service();
    let file = RosterFile::new(
        "roster.xlsx",
        xlsx(&[
            &[Some("Media"), None, Some("Worship")],
            &[None, None, Some("Sarah")],
            &[Some("Alice"), None, Some("Sarah")],
        ])?,
    );

    let preview = service.preview(&file).await?;

    let types: Vec<_> = preview.validation_errors.iter().map(|e| e.error_type).collect();
    assert_eq!(
        types,
        [ValidationErrorType::EmptyHead, ValidationErrorType::DuplicateInColumn]
    );
    assert_eq!(preview.validation_errors[1].column_index, 2);
    assert!(preview.session_id.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_import_leaves_directory_untouched() -> Result<()> {
    let (backend, service) = service();
    let existing = backend.seed_volunteer("Long-time Volunteer");
    backend.fail_department_creation("Worship");

    let preview = service.preview(&media_worship_xlsx()?).await?;
    let err = service
        .execute(&ExecuteRequest {
            session_id: preview.session_id.clone().unwrap_or_default(),
            resolutions: vec![ConflictResolution::create_one("John")],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::CreationFailed { rolled_back: true, .. }));
    assert!(backend.departments().is_empty());
    let ids: Vec<_> = backend.volunteers().into_iter().map(|v| v.id).collect();
    assert_eq!(ids, [existing.id]);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_execute_runs_once() -> Result<()> {
    let (backend, service) = service();
    let service = Arc::new(service);
    let preview = service.preview(&media_worship_xlsx()?).await?;
    let request = ExecuteRequest {
        session_id: preview.session_id.clone().unwrap_or_default(),
        resolutions: vec![ConflictResolution::create_one("John")],
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let request = request.clone();
            tokio::spawn(async move { service.execute(&request).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut already_executed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(ImportError::SessionAlreadyExecuted { .. }) => already_executed += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(already_executed, 3);
    assert_eq!(backend.departments().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_file_is_single_format_error() -> Result<()> {
    let (_, service) = service();
    let preview = service
        .preview(&RosterFile::new("roster.docx", b"whatever".to_vec()))
        .await?;

    assert_eq!(preview.validation_errors.len(), 1);
    assert_eq!(
        preview.validation_errors[0].error_type,
        ValidationErrorType::InvalidFileFormat
    );
    Ok(())
}

#[tokio::test]
async fn test_malformed_xlsx_cell_refs_are_format_errors() -> Result<()> {
    let (_, service) = service();
    let sheets = [
        r#"<worksheet><sheetData><row r="1"><c r="AAAAAAAAAAAAAAAA1" t="inlineStr"><is><t>Media</t></is></c></row></sheetData></worksheet>"#,
        r#"<worksheet><sheetData><row r="1048576"><c r="XFD1048576" t="inlineStr"><is><t>Media</t></is></c></row></sheetData></worksheet>"#,
    ];

    for sheet in sheets {
        let preview = service
            .preview(&RosterFile::new("roster.xlsx", workbook(sheet)?))
            .await?;

        assert_eq!(preview.validation_errors.len(), 1);
        assert_eq!(
            preview.validation_errors[0].error_type,
            ValidationErrorType::InvalidFileFormat
        );
        assert!(preview.session_id.is_none());
    }
    Ok(())
}
