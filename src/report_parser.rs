//! Parsers for the two text dialects the UWB module speaks: the anchor
//! roster printed in answer to `la`, and the `POS` lines streamed after
//! `lec`.
//!
//! An anchor line looks like
//!
//! ```text
//! [000012.340 INF]   0) id=000000000000D4A1 seat=0 seens=0 rssi=-255 fl=0000 pos=0.00:0.00:1.20
//! ```
//!
//! and a tag line like
//!
//! ```text
//! POS,0,D4A1,1.23,0.45,0.67,88,x0C
//! ```
//!
//! where fields 3, 4 and 5 are the x, y and z coordinates in metres.

use log::{debug, trace};
use nom::{
    bytes::complete::{is_a, tag, take_till},
    character::complete::char,
    combinator::{map, map_opt, map_res},
    sequence::{preceded, tuple},
    IResult,
};

use crate::Point3;

/// A fixed reference beacon, as reported during enumeration.
pub type AnchorPosition = Point3;

/// One accepted position of the tracked tag.
pub type TagReport = Point3;

/// Raw lines shorter than this are dropped without looking at them.
pub const MIN_TAG_LINE_LEN: usize = 20;

fn coordinate(s: &str) -> IResult<&str, f64> {
    map_res(is_a("0123456789.-"), |c: &str| c.parse::<f64>())(s)
}

fn anchor_position(s: &str) -> IResult<&str, AnchorPosition> {
    map(
        preceded(
            tag("pos="),
            tuple((
                coordinate,
                preceded(char(':'), coordinate),
                preceded(char(':'), coordinate),
            )),
        ),
        |(x, y, z)| Point3 { x, y, z },
    )(s)
}

fn field(s: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == ',')(s)
}

fn tag_coordinate(s: &str) -> IResult<&str, f64> {
    map_opt(field, |f: &str| {
        if f == "nan" {
            return None;
        }
        f.parse::<f64>().ok().filter(|v| v.is_finite())
    })(s)
}

fn tag_position(s: &str) -> IResult<&str, TagReport> {
    map(
        tuple((
            tag("POS"),
            preceded(char(','), field),
            preceded(char(','), field),
            preceded(char(','), tag_coordinate),
            preceded(char(','), tag_coordinate),
            preceded(char(','), tag_coordinate),
        )),
        |(_, _, _, x, y, z)| Point3 { x, y, z },
    )(s)
}

/// Looks for the first well-formed `pos=x:y:z` in a line.
fn find_anchor(line: &str) -> Option<AnchorPosition> {
    line.match_indices("pos=")
        .find_map(|(idx, _)| anchor_position(&line[idx..]).ok())
        .map(|(_rest, pos)| pos)
}

/// Collects the anchor positions found in the enumeration output, in order.
///
/// Lines without a recognisable `pos=` pattern contribute nothing, and a
/// position identical to one already collected is skipped.
pub fn parse_anchor_roster<S: AsRef<str>>(lines: &[S]) -> Vec<AnchorPosition> {
    let mut anchors: Vec<AnchorPosition> = Vec::new();
    for line in lines {
        match find_anchor(line.as_ref()) {
            Some(pos) if anchors.contains(&pos) => {
                debug!("duplicate anchor {} skipped", pos);
            }
            Some(pos) => anchors.push(pos),
            None => trace!("no anchor in ({})", line.as_ref()),
        }
    }
    anchors
}

/// Parses one raw line of the continuous position stream.
///
/// The length check applies to the raw bytes, terminator included. Any
/// trailing `\r`/`\n` is stripped before the comma-separated fields are
/// read. A line is rejected when it is too short, is not UTF-8, does not
/// start with the `POS` field, or carries a coordinate that is missing,
/// `nan`, or not a finite number.
pub fn parse_tag_line(line: &[u8]) -> Option<TagReport> {
    if line.is_empty() {
        return None;
    }
    let Ok(decoded) = std::str::from_utf8(line) else {
        debug!("tag line is not utf-8: {:?}", line);
        return None;
    };
    let decoded = decoded.trim_matches(|c: char| c == '\r' || c == '\n');
    trace!("{}", decoded);

    if line.len() < MIN_TAG_LINE_LEN {
        debug!("could not parse ({}), too short", decoded);
        return None;
    }

    match tag_position(decoded) {
        Ok((_rest, pos)) => Some(pos),
        Err(_) => {
            debug!("rejected tag line ({})", decoded);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_roster_single_line() {
        let anchors = parse_anchor_roster(&["x pos=1.0:-2.5:3.25 y"]);
        assert_eq!(
            anchors,
            vec![Point3 {
                x: 1.0,
                y: -2.5,
                z: 3.25
            }]
        );
    }

    #[test]
    fn anchor_roster_skips_noise() {
        let lines = [
            "[000010.120 INF] la",
            "[000010.130 INF]   0) id=0000000000001A2B seat=0 seens=0 rssi=-255 fl=0000 pos=0.00:0.00:1.20",
            "",
            "[000010.140 INF]   1) id=0000000000001A2C seat=1 seens=0 rssi=-255 fl=0000 pos=4.10:0.00:1.20",
            "[000010.150 INF]   2) id=0000000000001A2D seat=2 seens=0 rssi=-255 fl=0000 pos=1.2.3:0.00:1.20",
            "[000010.160 INF]   3) id=0000000000001A2E seat=3 seens=0 rssi=-255 fl=0000 pos=4.10:3.50:1.20",
            "[000010.170 INF] N=4",
        ];
        let anchors = parse_anchor_roster(&lines);
        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors[0], Point3 { x: 0.0, y: 0.0, z: 1.2 });
        assert_eq!(anchors[1], Point3 { x: 4.1, y: 0.0, z: 1.2 });
        assert_eq!(anchors[2], Point3 { x: 4.1, y: 3.5, z: 1.2 });
    }

    #[test]
    fn anchor_roster_skips_duplicates() {
        let lines = ["pos=1:1:1", "pos=2:2:2", "pos=1:1:1"];
        let anchors = parse_anchor_roster(&lines);
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn anchor_roster_later_match_in_line() {
        let anchors = parse_anchor_roster(&["pos=oops pos=1:2:3"]);
        assert_eq!(anchors, vec![Point3 { x: 1.0, y: 2.0, z: 3.0 }]);
    }

    #[test]
    fn anchor_roster_without_pattern_is_empty() {
        let anchors = parse_anchor_roster(&["id=0000 seat=0"]);
        assert!(anchors.is_empty());
    }

    #[test]
    fn tag_line_accepts_valid() {
        let pos = parse_tag_line(b"POS,0,0,1.0,2.0,3.0\r\n");
        assert_eq!(pos, Some(Point3 { x: 1.0, y: 2.0, z: 3.0 }));

        let pos = parse_tag_line(b"POS,0,D4A1,1.23,-0.45,0.67,88,x0C\r\n");
        assert_eq!(
            pos,
            Some(Point3 {
                x: 1.23,
                y: -0.45,
                z: 0.67
            })
        );
    }

    #[test]
    fn tag_line_rejects_nan() {
        assert_eq!(parse_tag_line(b"POS,0,0,nan,2.0,3.0,extra\r\n"), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,nan,3.0,extra\r\n"), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,2.0,nan,extra\r\n"), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,2.0,NaN,extra\r\n"), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,2.0,inf,extra\r\n"), None);
    }

    #[test]
    fn tag_line_rejects_wrong_header() {
        assert_eq!(parse_tag_line(b"DIST,0,0,1.0,2.0,3.0,extra\r\n"), None);
        assert_eq!(parse_tag_line(b"POSX,0,0,1.0,2.0,3.0,extra\r\n"), None);
    }

    #[test]
    fn tag_line_rejects_short_and_empty() {
        assert_eq!(parse_tag_line(b""), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1,2,3\r\n"), None);
    }

    #[test]
    fn tag_line_length_counts_the_raw_terminator() {
        // 19 bytes bare, 21 with CRLF
        let bare = b"POS,0,0,1.0,2.0,3.0";
        assert_eq!(bare.len(), MIN_TAG_LINE_LEN - 1);
        assert_eq!(parse_tag_line(bare), None);

        let mut terminated = bare.to_vec();
        terminated.extend_from_slice(b"\r\n");
        assert_eq!(
            parse_tag_line(&terminated),
            Some(Point3 { x: 1.0, y: 2.0, z: 3.0 })
        );
    }

    #[test]
    fn tag_line_rejects_missing_fields() {
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,2.0\r\n\r\n\r\n"), None);
        assert_eq!(parse_tag_line(b"POS,0,0,1.0,,3.0,extra,extra\r\n"), None);
    }

    #[test]
    fn tag_line_rejects_garbage_bytes() {
        assert_eq!(parse_tag_line(&[0xFF; 32]), None);
    }
}
