//! 评论流演示
//!
//! 连接本地后端（或 `VIDTUBE_API_URL` 指定的地址），打开一个视频的评论区，
//! 打印轮询刷新事件并发表一条评论。
//!
//! 用法: cargo run --example comment_feed -- <video_id> [email] [password]

use std::time::Duration;

use vidtube_sdk::{SDKEvent, SortKey, VidtubeConfig, VidtubeSDK};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let video_id = args.next().unwrap_or_else(|| "demo-video".to_string());
    let credentials = args.next().zip(args.next());

    let config = VidtubeConfig::builder()
        .persist_session(false)
        .poll_interval(Duration::from_secs(5))
        .debug_mode(true)
        .build();

    println!("\n==============================================");
    println!("🎬 评论流演示 (api: {})", config.base_url());
    println!("==============================================\n");

    let sdk = VidtubeSDK::initialize(config).await?;
    let mut events = sdk.subscribe_events();

    if let Some((email, password)) = credentials {
        match sdk.login(&email, &password).await {
            Ok(session) => println!("✅ 已登录: {}", session.user.username),
            Err(e) => println!("❌ 登录失败: {}", e.user_message("Login failed")),
        }
    }

    let view = sdk.open_video(&video_id).await?;
    view.set_sort_key(SortKey::MostLiked);
    print_comments(&view.comments());

    if sdk.is_authenticated() {
        match view.submit_comment("Hello from the comment feed demo").await {
            Ok(outcome) => println!("📝 发表结果: {:?}", outcome.is_committed()),
            Err(e) => println!("❌ {}", e.user_message("Failed to post comment")),
        }
    }

    // 观察两个轮询周期
    let deadline = tokio::time::sleep(Duration::from_secs(12));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(SDKEvent::CommentsRefreshed { count, .. }) => {
                    println!("🔄 评论已刷新: {} 条", count);
                    print_comments(&view.comments());
                }
                Ok(SDKEvent::PollTickSkipped { .. }) => println!("⏭️ 上一次拉取未返回，跳过"),
                Ok(other) => println!("📣 {}", other.event_type()),
                Err(_) => break,
            },
        }
    }

    let stats = view.poll_stats();
    println!(
        "\n📊 轮询统计: ticks={}, applied={}, skipped={}",
        stats.ticks, stats.applied, stats.skipped
    );

    view.unmount();
    sdk.shutdown().await?;
    Ok(())
}

fn print_comments(comments: &[vidtube_sdk::Comment]) {
    for comment in comments.iter().take(10) {
        println!(
            "  [{:>3} 👍] {}: {}{}",
            comment.like_count,
            comment.author.display_name,
            comment.body,
            if comment.edited { " (edited)" } else { "" }
        );
    }
}
