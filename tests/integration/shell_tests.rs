use super::common::*;
use std::time::Duration;
use tempfile::TempDir;
use terminus::config::MissPolicy;
use terminus::content::SiteContent;
use terminus::llm::AssistantError;
use terminus::output::{
    LibraryState, MarkdownError, MarkdownLibs, MarkdownLoader, RenderedContent, StreamingLine,
};
use terminus::shell::{BannerState, Key, SELECTION_PLACEHOLDER};
use terminus::storage::{FileStore, KeyValueStore, MemoryStore, CREDENTIAL_KEY};

fn streams(harness: &Harness) -> Vec<StreamingLine> {
    harness
        .shell
        .output()
        .lines()
        .iter()
        .filter_map(|line| line.stream().cloned())
        .collect()
}

struct BrokenLoader;

#[async_trait::async_trait]
impl MarkdownLoader for BrokenLoader {
    async fn load(&self) -> Result<MarkdownLibs, MarkdownError> {
        Err(MarkdownError::Unavailable("offline".into()))
    }
}

// ---- input line ----

#[tokio::test(start_paused = true)]
async fn test_command_is_echoed_with_prompt() {
    let mut h = HarnessBuilder::new().build();
    h.run("  pwd  ");
    assert_eq!(
        h.texts(),
        vec!["thomas@website:~$ pwd", "/home/thomas/website"]
    );
    assert_eq!(h.shell.input().value, "");
}

#[tokio::test(start_paused = true)]
async fn test_history_is_capped_and_navigable() {
    let mut h = HarnessBuilder::new()
        .miss_policy(MissPolicy::Suggest)
        .build();
    for i in 0..55 {
        h.run(&format!("cmd{}", i));
    }
    assert_eq!(h.shell.history().len(), 50);
    assert_eq!(h.shell.history().entries().last(), Some("cmd5"));

    h.key(Key::Up);
    assert_eq!(h.shell.input().value, "cmd54");
    h.key(Key::Up);
    assert_eq!(h.shell.input().value, "cmd53");
    h.key(Key::Down);
    assert_eq!(h.shell.input().value, "cmd54");
    h.key(Key::Down);
    assert_eq!(h.shell.input().value, "");
    h.key(Key::Down);
    assert_eq!(h.shell.input().value, "");
}

#[tokio::test(start_paused = true)]
async fn test_empty_submission_is_ignored() {
    let mut h = HarnessBuilder::new().build();
    h.typed("   ");
    h.key(Key::Enter);
    assert!(h.texts().is_empty());
    assert!(h.shell.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tab_completion() {
    let mut h = HarnessBuilder::new().build();
    h.typed("ma");
    h.key(Key::Tab);
    assert_eq!(h.shell.input().value, "matrix");

    h.run("clear");
    h.typed("s");
    h.key(Key::Tab);
    assert_eq!(h.shell.input().value, "s");
    assert_eq!(
        h.last(),
        "Available commands: skills, shutdown, sudo, setkey"
    );

    h.key(Key::Backspace);
    h.typed("zz");
    h.key(Key::Tab);
    assert_eq!(h.shell.input().value, "zz");
}

// ---- banner ----

#[tokio::test(start_paused = true)]
async fn test_banner_types_then_fades_once() {
    let mut h = HarnessBuilder::new().build();
    h.shell.start();
    assert_eq!(h.shell.banner().state(), BannerState::Typing);

    h.settle().await;
    assert_eq!(h.shell.banner().visible_text(), "Hi");
    assert_eq!(h.shell.banner().state(), BannerState::Shown);

    h.typed("a");
    assert_eq!(h.shell.banner().state(), BannerState::Fading);
    h.settle().await;
    assert_eq!(h.shell.banner().state(), BannerState::Hidden);

    h.typed("b");
    assert_eq!(h.shell.banner().state(), BannerState::Hidden);
}

// ---- credentials and preferences ----

#[tokio::test(start_paused = true)]
async fn test_setkey_and_clearkey() {
    let mut h = HarnessBuilder::new().build();

    h.run("setkey");
    assert_eq!(h.last(), "Usage: setkey YOUR_API_KEY");

    h.run("setkey AbCd1234");
    assert_eq!(h.last(), "API key set: ****1234");

    h.run("clearkey");
    assert_eq!(h.last(), "API key cleared.");

    h.run("ai hello");
    assert_eq!(h.last(), "No API key set. Use: setkey YOUR_API_KEY");
}

#[tokio::test(start_paused = true)]
async fn test_setkey_without_token_leaves_storage_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");

    let mut h = HarnessBuilder::new()
        .store(FileStore::open(&path).unwrap())
        .build();
    h.run("setkey");
    assert_eq!(h.last(), "Usage: setkey YOUR_API_KEY");
    h.run("setkey    ");
    assert_eq!(h.last(), "Usage: setkey YOUR_API_KEY");

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get(CREDENTIAL_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_setkey_reports_storage_failure() {
    let mut h = HarnessBuilder::new()
        .store(MemoryStore::with_quota(8))
        .build();
    h.run("setkey a-very-long-credential");
    assert_eq!(h.last(), "Failed to store API key.");
}

#[tokio::test(start_paused = true)]
async fn test_markdown_toggle_and_status() {
    let mut h = HarnessBuilder::new().build();
    assert!(h.shell.markdown_enabled());

    h.run("md toggle");
    assert_eq!(h.last(), "Markdown: OFF");
    h.run("MD TOGGLE");
    assert_eq!(h.last(), "Markdown: ON");
    h.run("md");
    assert_eq!(h.last(), "Markdown is ON");
    h.run("md off");
    h.run("md status");
    assert_eq!(h.last(), "Markdown is OFF");
    h.run("md maybe");
    assert_eq!(h.last(), "Usage: md on | md off | md toggle | md status");
}

#[tokio::test(start_paused = true)]
async fn test_markdown_failure_keeps_preference() {
    let mut h = HarnessBuilder::new()
        .store(MemoryStore::with_quota(4))
        .build();
    h.run("md off");
    assert_eq!(h.last(), "Failed to store Markdown preference.");
    assert!(h.shell.markdown_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_markdown_preference_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");

    let mut first = HarnessBuilder::new()
        .store(FileStore::open(&path).unwrap())
        .build();
    first.run("md off");

    let second = HarnessBuilder::new()
        .store(FileStore::open(&path).unwrap())
        .build();
    assert!(!second.shell.markdown_enabled());
}

// ---- blog ----

#[tokio::test(start_paused = true)]
async fn test_blog_selection_opens_post() {
    let mut h = HarnessBuilder::new().build();
    h.run("blog");
    assert!(h.shell.is_selecting());
    assert_eq!(h.shell.input().value, SELECTION_PLACEHOLDER);
    assert!(h.shell.input().read_only);
    assert!(h.texts().contains(&"► 1. First".to_string()));

    // typing is ignored while selecting
    h.typed("x");
    assert_eq!(h.shell.input().value, SELECTION_PLACEHOLDER);

    h.key(Key::Up);
    h.key(Key::Down);
    h.key(Key::Down);
    h.key(Key::Down);
    h.key(Key::Down);
    assert_eq!(h.shell.picker().unwrap().selected_index(), 2);
    assert!(h.texts().contains(&"► 3. Third".to_string()));

    h.key(Key::Enter);
    assert!(!h.shell.is_selecting());
    assert_eq!(h.shell.input().value, "");
    assert_eq!(h.last(), "Opening \"Third\"...");
    assert!(!h.texts().iter().any(|t| t.contains("2. Second")));

    h.advance(Duration::from_millis(600)).await;
    assert_eq!(h.last(), "Navigating to blog post...");
    assert!(h.host_calls().is_empty());

    h.settle().await;
    assert_eq!(h.host_calls(), vec![HostCall::Navigate("/blog/third/".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_blog_escape_removes_list() {
    let mut h = HarnessBuilder::new().build();
    h.run("blog");
    h.key(Key::Escape);

    assert!(!h.shell.is_selecting());
    assert!(!h.shell.input().read_only);
    assert_eq!(h.shell.input().value, "");
    assert!(!h.texts().iter().any(|t| t.contains("1. First")));
    assert_eq!(
        h.texts(),
        vec![
            "thomas@website:~$ blog",
            "Latest Blog Posts",
            "",
            "Use ↑/↓ arrow keys to navigate, Enter to select, Esc to cancel",
            "",
        ]
    );

    h.settle().await;
    assert!(h.host_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_blog_without_posts() {
    let mut h = HarnessBuilder::new().content(SiteContent::default()).build();
    h.run("blog");
    assert!(!h.shell.is_selecting());
    assert_eq!(
        h.texts()[1..].to_vec(),
        vec!["No blog posts available yet.", "Check back soon for updates!"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_read_by_number() {
    let mut h = HarnessBuilder::new().build();
    h.run("read 0");
    assert_eq!(
        h.last(),
        "Post 0 not found. Use \"blog\" to see available posts."
    );
    h.run("read 4");
    assert_eq!(
        h.last(),
        "Post 4 not found. Use \"blog\" to see available posts."
    );
    h.run("read abc");
    assert_eq!(
        h.last(),
        "Post abc not found. Use \"blog\" to see available posts."
    );

    h.run("read 1");
    assert_eq!(h.last(), "Opening \"First\"...");
    h.settle().await;
    assert_eq!(h.host_calls(), vec![HostCall::Navigate("/blog/first/".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_read_without_posts() {
    let mut h = HarnessBuilder::new().content(SiteContent::default()).build();
    h.run("read 1");
    assert_eq!(h.last(), "No blog posts available.");
}

// ---- staged actions ----

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_pending_navigation() {
    let mut h = HarnessBuilder::new().build();
    h.run("read 2");
    h.run("clear");
    assert_eq!(h.texts(), vec!["Terminal cleared"]);

    h.settle().await;
    assert!(h.host_calls().is_empty());
    assert_eq!(h.texts(), vec!["Terminal cleared"]);
}

#[tokio::test(start_paused = true)]
async fn test_reboot_reloads_after_delay() {
    let mut h = HarnessBuilder::new().build();
    h.run("reboot");
    assert_eq!(h.last(), "Rebooting system...");

    h.advance(Duration::from_millis(1000)).await;
    assert!(h.host_calls().is_empty());

    h.settle().await;
    assert_eq!(h.host_calls(), vec![HostCall::Reload]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_halts() {
    let mut h = HarnessBuilder::new().build();
    h.run("shutdown");
    assert_eq!(
        h.texts()[1..].to_vec(),
        vec!["System shutting down...", "Thank you for visiting!"]
    );

    h.settle().await;
    assert_eq!(h.host_calls(), vec![HostCall::Halt]);
    assert!(h.shell.is_halted());

    h.typed("help");
    assert_eq!(h.shell.input().value, "");
}

#[tokio::test(start_paused = true)]
async fn test_sudo_retracts() {
    let mut h = HarnessBuilder::new().build();
    h.run("sudo");
    assert_eq!(
        h.last(),
        "thomas is not in the sudoers file. This incident will be reported."
    );
    h.settle().await;
    assert_eq!(
        h.texts()[2..].to_vec(),
        vec!["Just kidding! 😄", "With great power comes great responsibility!"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_theme_toggles_host() {
    let mut h = HarnessBuilder::new().build();
    h.run("theme");
    assert_eq!(h.last(), "Switched to light theme");
    h.run("theme");
    assert_eq!(h.last(), "Switched to dark theme");
    assert_eq!(
        h.host_calls(),
        vec![
            HostCall::Theme(terminus::shell::Theme::Light),
            HostCall::Theme(terminus::shell::Theme::Dark)
        ]
    );
}

// ---- unknown commands ----

#[tokio::test(start_paused = true)]
async fn test_unknown_command_suggests() {
    let mut h = HarnessBuilder::new()
        .miss_policy(MissPolicy::Suggest)
        .build();
    h.run("hepl");
    assert_eq!(
        h.texts()[1..].to_vec(),
        vec![
            "Command not found: hepl. Type 'help' for available commands.",
            "Did you mean: help?"
        ]
    );

    h.run("xyzzyx");
    assert_eq!(
        h.last(),
        "Command not found: xyzzyx. Type 'help' for available commands."
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_goes_to_assistant() {
    let mut h = HarnessBuilder::new().with_key().build();
    h.run("Tell me More");
    h.settle().await;

    let streams = streams(&h);
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].buffer(), "Tell me More");
    assert!(streams[0].is_sealed());
}

// ---- assistant ----

#[tokio::test(start_paused = true)]
async fn test_ai_requires_prompt_and_key() {
    let mut h = HarnessBuilder::new().build();
    h.run("ai");
    assert_eq!(h.last(), "Usage: ai <prompt>");
    h.run("ai hi");
    assert_eq!(h.last(), "No API key set. Use: setkey YOUR_API_KEY");
    assert!(streams(&h).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ai_streams_into_prefixed_line() {
    let mut h = HarnessBuilder::new().with_key().markdown_default(false).build();
    h.run("ai one two three");
    h.settle().await;

    let line = streams(&h).remove(0);
    assert!(line.prefix().starts_with('['));
    assert!(line.prefix().ends_with("] Terminus: "));
    assert_eq!(line.buffer(), "one two three");
    assert_eq!(line.content(), &RenderedContent::Plain("one two three".into()));
}

#[tokio::test(start_paused = true)]
async fn test_ai_renders_markdown_safely() {
    let mut h = HarnessBuilder::new().with_key().build();
    h.run("ai **bold** <script>alert(1)</script> <img src=x onerror=boom>");
    h.settle().await;

    let line = streams(&h).remove(0);
    let html = line.content().as_str();
    assert!(line.content().is_html());
    assert!(html.contains("<strong>bold</strong>"));
    assert!(!html.contains("script"));
    assert!(!html.contains("alert"));
    assert!(!html.contains("onerror"));
    assert!(matches!(h.shell.markdown_state(), LibraryState::Ready(_)));
}

#[tokio::test(start_paused = true)]
async fn test_markdown_mode_fixed_when_line_created() {
    let mut h = HarnessBuilder::new().with_key().build();
    h.run("ai **bold** words here");
    h.advance(Duration::from_millis(15)).await;
    h.run("md off");
    assert!(!h.shell.markdown_enabled());
    h.settle().await;

    let line = streams(&h).remove(0);
    assert!(line.uses_markdown());
    assert!(line.is_sealed());
    assert!(line.content().is_html());
    assert!(line.content().as_str().contains("<strong>bold</strong>"));
}

#[tokio::test(start_paused = true)]
async fn test_plain_line_stays_plain_after_md_on() {
    let mut h = HarnessBuilder::new()
        .with_key()
        .markdown_default(false)
        .build();
    h.run("ai **bold** words here");
    h.advance(Duration::from_millis(15)).await;
    h.run("md on");
    assert!(h.shell.markdown_enabled());
    h.settle().await;

    let line = streams(&h).remove(0);
    assert!(!line.uses_markdown());
    assert!(line.is_sealed());
    assert_eq!(
        line.content(),
        &RenderedContent::Plain("**bold** words here".into())
    );
}

#[tokio::test(start_paused = true)]
async fn test_markdown_load_failure_falls_back_to_plain() {
    let mut h = HarnessBuilder::new()
        .with_key()
        .markdown(BrokenLoader)
        .build();
    h.run("ai **x**");
    h.settle().await;

    let line = streams(&h).remove(0);
    assert_eq!(line.content(), &RenderedContent::Plain("**x**".into()));
    assert!(matches!(h.shell.markdown_state(), LibraryState::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_newer_request_supersedes_older() {
    let mut h = HarnessBuilder::new().with_key().markdown_default(false).build();
    h.run("ai alpha beta gamma");
    h.advance(Duration::from_millis(15)).await;
    assert_eq!(streams(&h)[0].buffer(), "alpha ");

    h.run("ai second");
    h.settle().await;

    let streams = streams(&h);
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].buffer(), "alpha ");
    assert_eq!(streams[1].buffer(), "second");
    assert!(streams[1].is_sealed());
}

#[tokio::test(start_paused = true)]
async fn test_newer_request_supersedes_pending_rest_reply() {
    let rest = CannedRest::ok("late answer").delayed(Duration::from_secs(1));
    let calls = rest.calls.clone();
    let mut h = HarnessBuilder::new()
        .with_key()
        .sdk(EchoSdk::failing())
        .rest(rest)
        .markdown_default(false)
        .build();

    h.run("ai first");
    h.advance(Duration::from_millis(100)).await;
    h.run("ai second");
    h.settle().await;

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    let streams = streams(&h);
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].buffer(), "");
    assert!(!streams[0].is_sealed());
    assert_eq!(streams[1].buffer(), "late answer");
    assert!(streams[1].is_sealed());
}

#[tokio::test(start_paused = true)]
async fn test_clear_discards_running_stream() {
    let mut h = HarnessBuilder::new().with_key().build();
    h.run("ai alpha beta gamma");
    h.advance(Duration::from_millis(15)).await;
    h.run("clear");
    h.settle().await;
    assert_eq!(h.texts(), vec!["Terminal cleared"]);
}

#[tokio::test(start_paused = true)]
async fn test_rest_fallback_when_sdk_unavailable() {
    let rest = CannedRest::ok("from *rest*");
    let calls = rest.calls.clone();
    let sdk = EchoSdk::failing();
    let loads = sdk.loads.clone();

    let mut h = HarnessBuilder::new()
        .with_key()
        .sdk(sdk)
        .rest(rest)
        .markdown_default(false)
        .build();
    h.run("ai hi");
    h.settle().await;
    h.run("ai again");
    h.settle().await;

    let streams = streams(&h);
    assert_eq!(streams[0].buffer(), "from *rest*");
    assert_eq!(streams[1].buffer(), "from *rest*");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    // a failed load is retried by the next request
    assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sdk_is_loaded_once() {
    let sdk = EchoSdk::new(Duration::from_millis(1));
    let loads = sdk.loads.clone();
    let mut h = HarnessBuilder::new().with_key().sdk(sdk).build();

    h.run("ai one");
    h.settle().await;
    h.run("ai two");
    h.settle().await;
    assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rest_error_is_reported_in_line() {
    let mut h = HarnessBuilder::new()
        .with_key()
        .sdk(EchoSdk::failing())
        .rest(CannedRest::err(AssistantError::Http {
            status: 403,
            reason: "Forbidden".into(),
        }))
        .markdown_default(false)
        .build();
    h.run("ai hi");
    h.settle().await;

    let line = streams(&h).remove(0);
    assert_eq!(line.buffer(), "AI request failed: HTTP 403 Forbidden");
    assert!(line.is_sealed());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stream_times_out() {
    let mut h = HarnessBuilder::new()
        .with_key()
        .sdk(StalledSdk)
        .markdown_default(false)
        .build();
    h.run("ai hi");

    h.advance(Duration::from_secs(29)).await;
    assert_eq!(streams(&h)[0].buffer(), "");

    h.settle().await;
    assert_eq!(
        streams(&h)[0].buffer(),
        "AI request failed: request timed out after 30s"
    );
}
