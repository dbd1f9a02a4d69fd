//! Performance benchmarks for the hot protocol paths

use server::orchestrator::fill_player_slots;
use shared::{normalize_name, validate_name, Frame, LineReader, LineWriter, LobbyStatus, ServerMessage};
use std::time::Instant;

/// Benchmarks name normalization and validation
#[test]
fn benchmark_name_validation() {
    let requests = ["alice", "  Bob Smith ", "!a!", "x", "abcdefghijklmnop", "a--b__c"];

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let request = requests[i % requests.len()];
        let _ = validate_name(request);
    }

    let duration = start.elapsed();
    println!(
        "Name validation: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(normalize_name("  Bob Smith "), "Bob_Smith");
    // Should complete in under 1 second for 100k iterations
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks reading many lines split across small chunks
#[tokio::test]
async fn benchmark_line_framing() {
    let lines = 20_000;
    let mut wire = Vec::new();
    for i in 0..lines {
        wire.extend_from_slice(format!("Y: Rock, Paper, or Scissors? {}\r\n", i).as_bytes());
    }

    let start = Instant::now();

    let mut reader = LineReader::new(&wire[..]);
    let mut count = 0;
    while let Some(line) = reader.read_line().await {
        assert!(line.starts_with("Y: "));
        count += 1;
    }

    let duration = start.elapsed();
    println!("Line framing: {} lines in {:?}", count, duration);

    assert_eq!(count, lines);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks writing lines into an in-memory sink
#[tokio::test]
async fn benchmark_line_writing() {
    let lines = 20_000;
    let mut writer = LineWriter::new(Vec::new());

    let start = Instant::now();
    for _ in 0..lines {
        assert!(writer.write_line("N: Waiting for responses").await);
    }
    let duration = start.elapsed();
    println!("Line writing: {} lines in {:?}", lines, duration);

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client-side message classification
#[test]
fn benchmark_server_message_parsing() {
    let lines = ["PING", "Y: What is your name?", "N: Sorry", "quit", "<html>"];

    let iterations = 100_000;
    let start = Instant::now();

    let mut prompts = 0;
    for i in 0..iterations {
        if ServerMessage::parse(lines[i % lines.len()]).expects_reply() {
            prompts += 1;
        }
    }

    let duration = start.elapsed();
    println!("Message parsing: {} iterations in {:?}", iterations, duration);

    assert_eq!(prompts, iterations / lines.len());
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks frame tagging, slot filling and lobby parsing
#[test]
fn benchmark_frame_processing() {
    let names: Vec<String> = (0..8).map(|i| format!("player{}", i)).collect();

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let payload = fill_player_slots("@p0!'s Rock beats @p1!'s Scissors!", &names);
        let line = Frame::update(payload).to_string();
        let frame = Frame::parse(&line).unwrap();
        assert!(!frame.is_key());

        let lobby = LobbyStatus::Countdown {
            seconds: (i % 10) as u32,
            names: names.clone(),
        }
        .to_string();
        assert!(LobbyStatus::parse(&lobby).is_some());
    }

    let duration = start.elapsed();
    println!("Frame processing: {} iterations in {:?}", iterations, duration);

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
