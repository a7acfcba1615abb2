use pretty_assertions::assert_eq;

use super::*;
use crate::parser::parse;

const SAMPLE: &str = r##"
公開 関数 階乗(n)
    もし n <= 1 なら
        返す 1
    終わり
    返す n * 階乗(n - 1)
終わり

型 動物
    変数 名前 = "名無し"
    関数 鳴く()
        返す "#{自分.名前}です"
    終わり
終わり

変数 xs = [1, 2, 3]
繰り返す x を xs から
    試す
        もし x == 2 なら
            投げる "二"
        終わり
    捕まえる e
        表示(e.メッセージ)
    最後に
        xs[0] += 1
    終わり
終わり
定数 p = 非同期
    返す {"a": 1, b: -2.5}
終わり
表示(待つ p, 真 かつ 偽)
"##;

#[test]
fn test_program_round_trip() {
    let program = parse(SAMPLE).unwrap();
    let bytes = encode_program(&program);
    assert!(is_container(&bytes));
    assert!(!is_manifest(&bytes));
    let decoded = decode_program(&bytes).unwrap();
    assert_eq!(decoded, program);
}

#[test]
fn test_reencode_is_byte_identical() {
    let bytes = compile(SAMPLE).unwrap();
    let again = encode_program(&decode_program(&bytes).unwrap());
    assert_eq!(again, bytes);
}

#[test]
fn test_pool_is_in_first_seen_order() {
    let bytes = compile("表示(\"b\")\n表示(\"a\")").unwrap();
    // pool: 表示, b, a
    let count = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    assert_eq!(count, 3);
    let first_len = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
    assert_eq!(&bytes[20..20 + first_len], "表示".as_bytes());
}

#[test]
fn test_manifest_round_trip() {
    let manifest = Manifest {
        name: "数学".into(),
        version: "1.0.0".into(),
        author: String::new(),
        description: "算術".into(),
        library: "libmath.so".into(),
        entries: vec![
            ManifestEntry {
                name: "二乗".into(),
                min_args: 1,
                max_args: Some(1),
            },
            ManifestEntry {
                name: "合計".into(),
                min_args: 0,
                max_args: None,
            },
        ],
    };
    let bytes = encode_manifest(&manifest);
    assert!(is_manifest(&bytes));
    assert_eq!(decode_manifest(&bytes).unwrap(), manifest);
    assert_eq!(
        decode_program(&bytes),
        Err(BytecodeError::WrongPayload {
            expected: "program"
        })
    );
}

#[test]
fn test_rejects_bad_magic() {
    assert_eq!(decode_program(b"\x7fELF...."), Err(BytecodeError::BadMagic));
}

#[test]
fn test_rejects_compressed_and_unknown_flags() {
    let mut bytes = compile("1").unwrap();
    bytes[8] = FLAG_COMPRESSED as u8;
    assert_eq!(
        decode_program(&bytes),
        Err(BytecodeError::UnsupportedFlags(FLAG_COMPRESSED))
    );
    bytes[8] = 0x80;
    assert!(matches!(
        decode_program(&bytes),
        Err(BytecodeError::UnsupportedFlags(0x80))
    ));
}

#[test]
fn test_rejects_newer_major_version() {
    let mut bytes = compile("1").unwrap();
    bytes[4] = 2;
    assert_eq!(
        decode_program(&bytes),
        Err(BytecodeError::UnsupportedVersion { major: 2, minor: 0 })
    );
}

#[test]
fn test_truncated_input() {
    let bytes = compile("表示(1 + 2)").unwrap();
    for cut in [3, HEADER_LEN + 2, bytes.len() - 1] {
        assert!(decode_program(&bytes[..cut]).is_err(), "cut at {}", cut);
    }
}

#[test]
fn test_bad_tag_reports_offset() {
    let mut bytes = compile("1").unwrap();
    let pool_end = bytes.len() - (1 + 8 + 4 + 1 + 8 + 1 + 8 + 8);
    // program node, count, then the statement's tag
    let stmt_tag = pool_end + 9 + 4;
    bytes[stmt_tag] = 0xEE;
    assert_eq!(
        decode_program(&bytes),
        Err(BytecodeError::BadTag {
            context: "statement",
            tag: 0xEE,
            offset: stmt_tag,
        })
    );
}

#[test]
fn test_trailing_bytes() {
    let mut bytes = compile("1").unwrap();
    bytes.push(0);
    assert_eq!(decode_program(&bytes), Err(BytecodeError::TrailingBytes(1)));
}
