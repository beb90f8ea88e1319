//! Output lines shaped like what `nmap -oX - -vvv --stats-every 2s` prints.

pub const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub fn nmaprun(start: &str, version: &str) -> String {
    format!(
        r#"<nmaprun scanner="nmap" args="nmap -oX - -vvv --stats-every 2s -sT 127.0.0.1" start="{start}" startstr="Tue Nov 14 22:13:20 2023" version="{version}" xmloutputversion="1.05">"#
    )
}

pub fn taskprogress(percent: &str, etc: &str) -> String {
    format!(
        r#"<taskprogress task="Connect Scan" time="1700000005" percent="{percent}" remaining="12" etc="{etc}"/>"#
    )
}

pub fn finished(time: &str, elapsed: &str, summary: &str) -> String {
    format!(
        r#"<runstats><finished time="{time}" timestr="Tue Nov 14 22:14:02 2023" summary="{summary}" elapsed="{elapsed}" exit="success"/>"#
    )
}

/// Lines without any lifecycle marker.
pub fn host_block() -> Vec<String> {
    vec![
        r#"<host starttime="1700000001" endtime="1700000002"><status state="up" reason="localhost-response" reason_ttl="0"/>"#.to_string(),
        r#"<address addr="127.0.0.1" addrtype="ipv4"/>"#.to_string(),
        r#"<ports><port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="0"/><service name="ssh" method="table" conf="3"/></port>"#.to_string(),
        "</ports>".to_string(),
        "</host>".to_string(),
    ]
}

/// A complete successful scan: header, two progress reports, one host,
/// finished marker and closing tags.
pub fn full_scan() -> Vec<String> {
    let mut lines = vec![
        XML_DECL.to_string(),
        nmaprun("1700000000", "7.94"),
        taskprogress("42", "00:01:30"),
        taskprogress("55", "00:00:50"),
    ];
    lines.extend(host_block());
    lines.push(finished(
        "1700000042",
        "42.00",
        "Nmap done at Tue Nov 14 22:14:02 2023; 1 IP address (1 host up) scanned in 42.00 seconds",
    ));
    lines.push(r#"<hosts up="1" down="0" total="1"/>"#.to_string());
    lines.push("</runstats>".to_string());
    lines.push("</nmaprun>".to_string());
    lines
}
