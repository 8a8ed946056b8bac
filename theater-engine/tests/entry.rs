mod common;

use common::{fast_config, FakeDocument, FakeElement, FakeState, PageImage, Slide};
use theater_engine::{CandidateScorer, EntryOutcome, EntrySequencer, ViewerProbe};

async fn enter(doc: &FakeDocument) -> EntryOutcome {
    let config = fast_config();
    let scorer = CandidateScorer::from_config(&config.scoring);
    EntrySequencer::new(&scorer, &config.scoring, &config.matchers, &config.traversal.pauses)
        .enter(doc)
        .await
        .unwrap()
}

#[tokio::test]
async fn small_elements_are_never_candidates() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![
            PageImage::new(70.0, 70.0),
            PageImage::new(50.0, 50.0),
            PageImage::new(70.0, 30.0),
            PageImage::new(20.0, 20.0),
        ],
        ..FakeState::default()
    });
    let ranked = CandidateScorer::default().rank(&doc, "img", None).await.unwrap();
    assert!(ranked.is_empty());
}

#[tokio::test]
async fn large_element_wins_over_its_small_container() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![PageImage::new(50.0, 50.0), PageImage::new(200.0, 200.0)],
        ..FakeState::default()
    });
    let ranked = CandidateScorer::default().rank(&doc, "img", None).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].element, FakeElement::PageImage(1));
    assert_eq!(ranked[0].area(), 40_000.0);
}

#[tokio::test]
async fn hidden_elements_are_skipped() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![
            PageImage::new(900.0, 900.0).hidden(),
            PageImage::new(300.0, 200.0),
            PageImage::new(400.0, 300.0),
        ],
        ..FakeState::default()
    });
    let ranked = CandidateScorer::default().rank(&doc, "img", None).await.unwrap();
    let order: Vec<_> = ranked.into_iter().map(|c| c.element).collect();
    assert_eq!(order, vec![FakeElement::PageImage(2), FakeElement::PageImage(1)]);
}

#[tokio::test]
async fn open_viewer_needs_no_clicks() {
    common::init_test_tracing();
    let doc = FakeDocument::new(FakeState {
        page_images: vec![PageImage::new(600.0, 400.0).opening()],
        viewer_open: true,
        slides: vec![Slide::photo(1, "https://cdn.test/a.jpg")],
        ..FakeState::default()
    });

    assert_eq!(enter(&doc).await, EntryOutcome::AlreadyOpen);
    assert!(doc.state().element_clicks.is_empty());
}

#[tokio::test]
async fn clicks_down_the_ranking_until_the_viewer_opens() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![PageImage::new(800.0, 600.0), PageImage::new(400.0, 300.0).opening()],
        slides: vec![Slide::photo(1, "https://cdn.test/a.jpg")],
        ..FakeState::default()
    });

    assert_eq!(
        enter(&doc).await,
        EntryOutcome::Opened {
            attempt: 2,
            area: 120_000.0
        }
    );
    assert_eq!(
        doc.state().element_clicks,
        vec![FakeElement::PageImage(0), FakeElement::PageImage(1)]
    );
}

#[tokio::test]
async fn a_failing_click_moves_on_to_the_next_candidate() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![
            PageImage::new(800.0, 600.0).failing(),
            PageImage::new(400.0, 300.0).opening(),
        ],
        slides: vec![Slide::photo(1, "https://cdn.test/a.jpg")],
        ..FakeState::default()
    });

    let outcome = enter(&doc).await;
    assert!(matches!(outcome, EntryOutcome::Opened { attempt: 2, .. }));
}

#[tokio::test]
async fn gives_up_after_the_attempt_budget() {
    let doc = FakeDocument::new(FakeState {
        page_images: (0..7)
            .map(|i| PageImage::new(100.0 + i as f64, 100.0))
            .collect(),
        ..FakeState::default()
    });

    let outcome = enter(&doc).await;
    assert_eq!(outcome, EntryOutcome::NotOpened { attempts: 5 });
    assert!(!outcome.is_open());
    assert_eq!(doc.state().element_clicks.len(), 5);
    // largest first
    assert_eq!(doc.state().element_clicks[0], FakeElement::PageImage(6));
}

#[tokio::test]
async fn falls_back_to_an_unscoped_query() {
    let doc = FakeDocument::new(FakeState {
        page_images: vec![PageImage::new(300.0, 300.0).opening()],
        content_scoped: false,
        slides: vec![Slide::photo(1, "https://cdn.test/a.jpg")],
        ..FakeState::default()
    });

    assert!(matches!(enter(&doc).await, EntryOutcome::Opened { attempt: 1, .. }));
    let queries = doc.state().queries.clone();
    let scoped = queries.iter().position(|q| q.contains("role=\"main\"")).unwrap();
    let fallback = queries.iter().position(|q| q == "img").unwrap();
    assert!(scoped < fallback);
}

#[tokio::test]
async fn any_single_signal_means_the_viewer_is_open() {
    let matchers = fast_config().matchers;
    let probe = ViewerProbe::new(&matchers);

    let dialog_only = FakeDocument::new(FakeState {
        viewer_open: true,
        close_button: false,
        ..FakeState::default()
    });
    assert!(probe.is_open(&dialog_only).await.unwrap());

    let close_only = FakeDocument::new(FakeState {
        viewer_open: true,
        dialog: false,
        ..FakeState::default()
    });
    assert!(probe.is_open(&close_only).await.unwrap());

    let location_only = FakeDocument::new(FakeState {
        viewer_open: true,
        dialog: false,
        close_button: false,
        slides: vec![Slide::empty(7)],
        ..FakeState::default()
    });
    assert!(probe.is_open(&location_only).await.unwrap());

    let closed = FakeDocument::new(FakeState::default());
    assert!(!probe.is_open(&closed).await.unwrap());
}

#[tokio::test]
async fn localized_close_control_alone_means_open() {
    let matchers = fast_config().matchers;
    let probe = ViewerProbe::new(&matchers);

    let doc = FakeDocument::new(FakeState {
        viewer_open: true,
        dialog: false,
        close_label: "Đóng",
        ..FakeState::default()
    });
    assert!(probe.is_open(&doc).await.unwrap());

    let queries = doc.state().queries.clone();
    let english = queries.iter().position(|q| q == r#"[aria-label="Close"]"#).unwrap();
    let vietnamese = queries.iter().position(|q| q == r#"[aria-label="Đóng"]"#).unwrap();
    assert!(english < vietnamese);
}
