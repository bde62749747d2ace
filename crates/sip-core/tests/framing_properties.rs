//! Property tests for datagram framing

use proptest::prelude::*;

use sigflow_sip_core::framing::split_frame;

// Lines that can never be mistaken for the boundary (no `l`, no `:`) and are never blank
fn plain_line() -> impl Strategy<Value = String> {
    "[a-km-z0-9=/. ]{0,12}[a-km-z0-9]"
}

fn assemble(header: &[String], marker: Option<&str>, session: &[String], blank_every: usize) -> Vec<u8> {
    let mut out = String::new();
    let mut lines: Vec<&str> = header.iter().map(String::as_str).collect();
    if let Some(marker) = marker {
        lines.push(marker);
    }
    lines.extend(session.iter().map(String::as_str));

    for (idx, line) in lines.iter().enumerate() {
        out.push_str(line);
        out.push_str("\r\n");
        if blank_every > 0 && idx % blank_every == 0 {
            out.push_str("\r\n");
        }
    }
    out.into_bytes()
}

proptest! {
    #[test]
    fn marker_partitions_non_blank_lines(
        header in prop::collection::vec(plain_line(), 0..8),
        session in prop::collection::vec(plain_line(), 0..8),
        length in 0u32..5000,
        upper in any::<bool>(),
        blank_every in 0usize..4,
    ) {
        let marker = if upper {
            format!("CONTENT-LENGTH: {}", length)
        } else {
            format!("Content-Length: {}", length)
        };
        let raw = assemble(&header, Some(&marker), &session, blank_every);
        let segments = split_frame(&raw);

        let mut expected_header = header.clone();
        expected_header.push(marker.clone());
        prop_assert_eq!(&segments.header, &expected_header.join("\n").into_bytes());
        prop_assert_eq!(&segments.session, &session.join("\n").into_bytes());
        prop_assert_eq!(segments.declared_length(), Some(length as usize));
    }

    #[test]
    fn no_marker_means_empty_session(
        lines in prop::collection::vec(plain_line(), 0..12),
        blank_every in 0usize..4,
    ) {
        let raw = assemble(&lines, None, &[], blank_every);
        let segments = split_frame(&raw);

        prop_assert!(!segments.has_marker());
        prop_assert!(segments.session.is_empty());
        prop_assert_eq!(&segments.header, &lines.join("\n").into_bytes());
    }
}
