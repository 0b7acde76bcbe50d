/*!
 * Tests for reply recovery through the translation client
 */

use std::sync::Arc;

use yadtwai::document::{ContentSegment, EMPTY_RESPONSE_MARKER, MISSING_TRANSLATION_MARKER};
use yadtwai::providers::mock::MockProvider;
use yadtwai::translation::prompts::BROKEN_OUTPUT_HEADER;
use yadtwai::translation::{ClientSettings, Glossary, TranslationClient};

fn texts(n: u64) -> Vec<ContentSegment> {
    (0..n).map(|id| ContentSegment::text(id, format!("text {}", id))).collect()
}

fn client_with(provider: &MockProvider, json_repair_retries: u32) -> TranslationClient {
    let mut settings = ClientSettings::default();
    settings.json_repair_retries = json_repair_retries;
    TranslationClient::new(Arc::new(provider.clone()), settings)
}

#[tokio::test]
async fn test_translateBatch_withFencedReplyAndProse_shouldParseStrictly() {
    let reply = "Sure! Here is the translation:\n```json\n[{\"id\": 0, \"translation\": \"zéro\"}, {\"id\": 1, \"translation\": \"un\"}]\n```";
    let provider = MockProvider::scripted(vec![Ok(reply.to_string())]);
    let client = client_with(&provider, 0);

    let result = client.translate_batch(&texts(2), "", None).await.unwrap();

    assert_eq!(result.translations, vec!["zéro", "un"]);
    assert_eq!(client.stats().salvaged_replies, 0);
}

#[tokio::test]
async fn test_translateBatch_withTruncatedReply_shouldSalvageAndFillGap() {
    let reply = r#"[{"id": 0, "translation": "zéro"}, {"id": 1, "translation": "un"}, {"id": 2, "transla"#;
    let provider = MockProvider::scripted(vec![Ok(reply.to_string())]);
    let client = client_with(&provider, 0);

    let result = client.translate_batch(&texts(3), "", None).await.unwrap();

    assert_eq!(result.translations[0], "zéro");
    assert_eq!(result.translations[1], "un");
    assert_eq!(result.translations[2], MISSING_TRANSLATION_MARKER);
    assert_eq!(result.missing, vec![2]);
    assert_eq!(client.stats().salvaged_replies, 1);
}

#[tokio::test]
async fn test_translateBatch_withRepairRoundTrip_shouldUseCorrectedJson() {
    let provider = MockProvider::scripted(vec![
        Ok("The translations are: zero, one".to_string()),
        Ok(r#"[{"id": 0, "translation": "zéro"}, {"id": 1, "translation": "un"}]"#.to_string()),
    ]);
    let client = client_with(&provider, 1);

    let result = client.translate_batch(&texts(2), "", None).await.unwrap();

    assert_eq!(result.translations, vec!["zéro", "un"]);
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].user.contains(BROKEN_OUTPUT_HEADER));
    assert!(requests[1].user.contains("The translations are: zero, one"));
}

#[tokio::test]
async fn test_translateBatch_withoutRepairRetries_shouldNotSendRepairPrompt() {
    let provider = MockProvider::scripted(vec![Ok("no json here".to_string())]);
    let client = client_with(&provider, 0);

    assert!(client.translate_batch(&texts(2), "", None).await.is_err());
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_translateBatch_shouldSendContextAndGlossary() {
    let provider = MockProvider::working();
    let client = client_with(&provider, 0);
    let mut glossary = Glossary::new();
    glossary.insert("Frodo", "Frodon");

    client
        .translate_batch(&texts(1), "the previous paragraph", Some(&glossary))
        .await
        .unwrap();
    client.translate_batch(&texts(1), "", None).await.unwrap();

    let requests = provider.requests();
    assert!(requests[0].user.contains("the previous paragraph"));
    assert!(requests[0].user.contains("- **Frodo**: Must be translated as **Frodon**"));
    assert!(requests[1].user.contains("(Beginning of document - no previous context)"));
    assert!(!requests[1].user.contains("Must be translated as"));
}

#[tokio::test]
async fn test_translateBatch_withEmptyImageReply_shouldUseEmptyResponseMarker() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fig.jpg"), [0xff, 0xd8, 0xff]).unwrap();
    let provider = MockProvider::scripted(vec![Ok(String::new())]);
    let settings = ClientSettings::default().with_image_root(dir.path());
    let client = TranslationClient::new(Arc::new(provider.clone()), settings);

    let result = client
        .translate_batch(&[ContentSegment::image(5, "fig.jpg")], "", None)
        .await
        .unwrap();

    assert_eq!(result.translations, vec![EMPTY_RESPONSE_MARKER]);
    let image = provider.requests()[0].image.clone().unwrap();
    assert_eq!(image.media_type, "image/jpeg");
}
