//! Session behavior with overlapping uploads and questions.

mod common;

use std::time::Duration;

use docqa::testing::MockBackend;
use docqa::{AnswerMode, DocQaError, DocQaEvent, ExtractionMethod, UploadedFile};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use common::{live_config, mock_session, session_with};

fn single_page_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("Td", vec![0.into(), (-18).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

#[tokio::test]
async fn test_pdf_upload_and_search() {
    let (session, _) = mock_session();
    let pdf = single_page_pdf(&["Annual Budget", "Travel budget: 4,000", "Staff costs rose"]);

    let document = session
        .upload(UploadedFile::new("budget.pdf", pdf))
        .await
        .unwrap();

    assert_eq!(document.extraction_method, ExtractionMethod::PdfStructured);
    assert!(document
        .extracted_text
        .starts_with("# budget.pdf\n\nPDF Document - 1 pages\n\n## Page 1\n\n"));

    let answer = session.ask("find budget", AnswerMode::mock()).await.unwrap();
    // The title line names the file, so it matches too.
    assert!(answer.response.body.contains("Found 3 matching lines"));
    assert!(answer
        .response
        .body
        .contains("1. # budget.pdf\n2. Annual Budget\n3. Travel budget: 4,000"));
}

#[tokio::test]
async fn test_overlapping_uploads_keep_newest() {
    let (session, _) = mock_session();
    let first = UploadedFile::new("first.txt", "first ".repeat(200_000));
    let second = UploadedFile::new("second.txt", "second");

    let (a, b) = tokio::join!(session.upload(first), session.upload(second));

    let b = b.unwrap();
    assert_eq!(b.generation, 2);
    match a {
        Err(DocQaError::Superseded) => {}
        Ok(document) => assert_eq!(document.generation, 1),
        Err(other) => panic!("unexpected error: {other}"),
    }
    let current = session.current_document().await.unwrap();
    assert_eq!(current.file_name, "second.txt");
}

#[tokio::test]
async fn test_cancelled_upload_keeps_previous_document() {
    let (session, _) = mock_session();
    session.upload(UploadedFile::new("a.txt", "alpha")).await.unwrap();

    let mut started = session.subscribe();
    let mut events = session.subscribe();
    let large = UploadedFile::new("large.txt", "words ".repeat(500_000));

    let (result, _) = tokio::join!(session.upload(large), async {
        while let Ok(event) = started.recv().await {
            if matches!(event, DocQaEvent::ExtractionStarted { generation: 2, .. }) {
                session.cancel_upload();
                break;
            }
        }
    });

    assert!(matches!(result, Err(DocQaError::Cancelled)));
    assert_eq!(session.current_document().await.unwrap().file_name, "a.txt");

    let mut discarded = None;
    while let Ok(event) = events.try_recv() {
        if let DocQaEvent::ExtractionDiscarded {
            generation,
            current_generation,
        } = event
        {
            discarded = Some((generation, current_generation));
        }
    }
    assert_eq!(discarded, Some((2, 2)));
}

#[tokio::test]
async fn test_answer_for_replaced_document_is_discarded() {
    let backend = MockBackend::new()
        .with_response("slow answer")
        .with_delay(Duration::from_millis(200));
    let (session, _) = session_with(live_config("http://unused"), backend);
    let mut events = session.subscribe();

    session.upload(UploadedFile::new("a.txt", "alpha")).await.unwrap();

    let (answer, replaced) = tokio::join!(session.ask("hello", AnswerMode::remote()), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.upload(UploadedFile::new("b.txt", "beta")).await
    });

    assert!(replaced.is_ok());
    assert!(matches!(answer, Err(DocQaError::Superseded)));
    assert!(session.last_response().await.is_none());

    let mut saw_discard = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, DocQaEvent::ResponseDiscarded { generation: 1, .. }) {
            saw_discard = true;
        }
    }
    assert!(saw_discard);
}

#[tokio::test]
async fn test_newer_question_wins() {
    let backend = MockBackend::new()
        .with_response("first answer")
        .with_response("second answer")
        .with_delay(Duration::from_millis(150));
    let (session, _) = session_with(live_config("http://unused"), backend);
    session.upload(UploadedFile::new("a.txt", "alpha")).await.unwrap();

    let (first, second) = tokio::join!(session.ask("one", AnswerMode::remote()), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.ask("two", AnswerMode::remote()).await
    });

    assert!(matches!(first, Err(DocQaError::Superseded)));
    assert_eq!(second.unwrap().response.body, "second answer");
    assert_eq!(session.last_response().await.unwrap().body, "second answer");
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let (session, _) = mock_session();
    let mut events = session.subscribe();

    session.upload(UploadedFile::new("a.txt", "alpha")).await.unwrap();
    session.ask("summary", AnswerMode::mock()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            DocQaEvent::ExtractionStarted { .. } => "extraction_started",
            DocQaEvent::ExtractionSucceeded { .. } => "extraction_succeeded",
            DocQaEvent::QueryStarted { .. } => "query_started",
            DocQaEvent::ResponseReady { .. } => "response_ready",
            _ => "other",
        });
    }
    assert_eq!(
        kinds,
        vec!["extraction_started", "extraction_succeeded", "query_started", "response_ready"]
    );
}

#[tokio::test]
async fn test_user_input_errors_have_no_side_effects() {
    let (session, notifier) = mock_session();

    assert!(matches!(
        session.ask("summary", AnswerMode::mock()).await,
        Err(DocQaError::NoDocumentLoaded)
    ));
    assert_eq!(notifier.last().unwrap().message, "Please upload a document first");

    session.upload(UploadedFile::new("a.txt", "alpha")).await.unwrap();
    assert!(matches!(
        session.ask("", AnswerMode::mock()).await,
        Err(DocQaError::EmptyQuery)
    ));
    assert!(session.last_response().await.is_none());
    assert_eq!(session.usage_count(), 0);
}
