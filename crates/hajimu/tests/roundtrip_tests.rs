use std::sync::Arc;

use hajimu::lexer::{Lexer, TokenKind};
use hajimu::*;
use pretty_assertions::assert_eq;

/// Programs covering every statement form and most expressions.
const PROGRAMS: &[&str] = &[
    "表示(1 + 2 * 3)",
    "変数 x = [1,2,3]; x に 4 を 追加する; 表示(x の 長さ)",
    "関数 階乗(n)\n もし n <= 1 なら\n  返す 1\n 終わり\n 返す n * 階乗(n - 1)\n終わり\n表示(階乗(10))",
    "試す { 1/0 を 整数で } 捕まえる e { 表示(e.種類) }",
    "定数 表 = {名前: \"太郎\", 年齢: 20}\n繰り返す k を 表 から\n 表示(\"#{k} = #{表[k]}\")\n終わり",
    "変数 i = 0\n繰り返す i < 3 の間 {\n i += 1\n もし i == 2 なら { 次へ }\n}\n繰り返す {\n 抜ける\n}",
    "型 点\n 変数 x = 0\n 変数 y = 0\n 関数 和()\n  返す 自分.x + 自分.y\n 終わり\n終わり\n型 点3 継承 点\n 変数 z = 0\n終わり\n表示(点(1, 2).和())",
    "変数 p = 非同期\n 返す 1\n終わり\n変数 m = ミューテックス作成()\n排他 m\n 表示(待つ p)\n終わり",
    "関数 f(a, b = 2, ...残り)\n 返す [a, b, 残り]\n終わり\n表示(f(1), -f(1, 3, 4)[0], !偽 かつ 真 または 無 == 無)",
    "試す\n 投げる エラー作成(\"TypeError\", \"型\")\n捕まえる e が TypeError\n 表示(e)\n捕まえる\n 表示(\"他\")\n最後に\n 表示(\"後\")\n終わり",
    "/* 注釈 */ 変数 文 = 「かぎ括弧」 // 行末\n表示(文)。\n",
];

// ═══════════════════════════════════════════════════════════════════════
// Lexer
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_lossless_lexing_reproduces_source() {
    for src in PROGRAMS {
        let tokens = Lexer::new(src).lossless(true).tokenize().unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.lexeme(src)).collect();
        assert_eq!(rebuilt, *src);
        assert!(matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)));
    }
}

#[test]
fn test_default_lexing_drops_trivia() {
    let tokens = Lexer::new("変数 x = 1 // 注釈").tokenize().unwrap();
    assert!(tokens.iter().all(|t| !t.kind.is_trivia()));
}

// ═══════════════════════════════════════════════════════════════════════
// HJPB
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bytecode_reencode_is_byte_identical() {
    for src in PROGRAMS {
        let first = bytecode::compile(src).unwrap();
        let program = bytecode::decode_program(&first).unwrap();
        let second = bytecode::encode_program(&program);
        assert_eq!(first, second, "re-encoding changed the bytes of {:?}", src);
    }
}

#[test]
fn test_compiled_program_behaves_like_source() {
    for src in PROGRAMS {
        let from_source = {
            let out = OutputBuffer::new();
            let mut interp = Interpreter::with_output(EvalContext::default(), out.clone());
            interp.run_source("<src>", src).unwrap();
            out.contents()
        };
        let from_bytecode = {
            let out = OutputBuffer::new();
            let mut interp = Interpreter::with_output(EvalContext::default(), out.clone());
            let program = bytecode::decode_program(&bytecode::compile(src).unwrap()).unwrap();
            interp
                .run_program(&program, Some(Arc::new(SourceMap::new("<hjp>", ""))))
                .unwrap();
            out.contents()
        };
        assert_eq!(from_source, from_bytecode, "{:?}", src);
    }
}

#[test]
fn test_compile_reports_parse_errors() {
    assert!(bytecode::compile("関数 (").is_err());
}
