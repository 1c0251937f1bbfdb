//! Tests for CFI rule-set parsing and postfix evaluation

use std::collections::HashMap;

use symres_core::error::{CfiRuleError, EvaluationError, ResolverError, ResolverResult};
use symres_core::symbols::{BasicModule, SymbolModule};
use symres_core::types::Address;
use symres_core::unwind::{
    CfiFrameInfo, CfiParseHandler, CfiRuleParser, MemoryAccess, NoMemory, PostfixEvaluator, RegisterValueMap,
};

/// Little-endian memory made of 8-byte words.
#[derive(Default)]
struct WordMemory
{
    words: HashMap<u64, u64>,
}

impl WordMemory
{
    fn with(mut self, address: u64, value: u64) -> Self
    {
        self.words.insert(address, value);
        self
    }
}

impl MemoryAccess for WordMemory
{
    fn read_u64(&self, address: Address) -> ResolverResult<u64>
    {
        self.words
            .get(&address.value())
            .copied()
            .ok_or(ResolverError::MemoryRead(address))
    }
}

#[derive(Default)]
struct CollectingHandler
{
    rules: Vec<(String, String)>,
}

impl CfiParseHandler for CollectingHandler
{
    fn cfa_rule(&mut self, expression: &str)
    {
        self.rules.push((".cfa".to_string(), expression.to_string()));
    }

    fn ra_rule(&mut self, expression: &str)
    {
        self.rules.push((".ra".to_string(), expression.to_string()));
    }

    fn register_rule(&mut self, name: &str, expression: &str)
    {
        self.rules.push((name.to_string(), expression.to_string()));
    }
}

fn parse(rule_set: &str) -> (Result<(), CfiRuleError>, Vec<(String, String)>)
{
    let mut handler = CollectingHandler::default();
    let result = CfiRuleParser::new(&mut handler).parse(rule_set);
    (result, handler.rules)
}

fn registers(pairs: &[(&str, u64)]) -> RegisterValueMap
{
    pairs.iter().map(|&(name, value)| (name.to_string(), value)).collect()
}

#[test]
fn test_parser_reports_rules_in_order()
{
    let (result, rules) = parse(".cfa: $rsp  16 +\t.ra: .cfa 8 - ^ $rbp: .cfa 16 - ^");

    assert_eq!(result, Ok(()));
    assert_eq!(
        rules,
        vec![
            (".cfa".to_string(), "$rsp 16 +".to_string()),
            (".ra".to_string(), ".cfa 8 - ^".to_string()),
            ("$rbp".to_string(), ".cfa 16 - ^".to_string()),
        ]
    );
}

#[test]
fn test_parser_empty_rule_set()
{
    assert_eq!(parse("").0, Err(CfiRuleError::Empty));
    assert_eq!(parse("   \n").0, Err(CfiRuleError::Empty));
}

#[test]
fn test_parser_bare_colon()
{
    let (result, rules) = parse(".cfa: 8 : 4");
    assert_eq!(result, Err(CfiRuleError::EmptyName));
    assert!(rules.is_empty());
}

#[test]
fn test_parser_expression_before_name()
{
    assert_eq!(parse("8 .cfa: 4").0, Err(CfiRuleError::MissingName));
}

#[test]
fn test_parser_name_without_expression()
{
    let (result, rules) = parse(".cfa: $esp 4 + .ra:");
    assert_eq!(result, Err(CfiRuleError::MissingExpression(".ra".to_string())));
    // The CFA rule was delivered before the failure.
    assert_eq!(rules, vec![(".cfa".to_string(), "$esp 4 +".to_string())]);

    let (result, rules) = parse(".cfa: .ra: 4");
    assert_eq!(result, Err(CfiRuleError::MissingExpression(".cfa".to_string())));
    assert!(rules.is_empty());
}

#[test]
fn test_parse_cfi_rule_set_through_module()
{
    let module = BasicModule::new("bridge");
    let mut info = CfiFrameInfo::default();

    module
        .parse_cfi_rule_set(".cfa: $esp 4 + .ra: .cfa 4 - ^", &mut info)
        .unwrap();
    assert_eq!(info.cfa_rule(), Some("$esp 4 +"));
    assert_eq!(info.ra_rule(), Some(".cfa 4 - ^"));

    // Later rules replace earlier ones for the same name.
    module.parse_cfi_rule_set(".cfa: $ebp 8 +", &mut info).unwrap();
    assert_eq!(info.cfa_rule(), Some("$ebp 8 +"));
    assert_eq!(info.ra_rule(), Some(".cfa 4 - ^"));
}

#[test]
fn test_parse_cfi_rule_set_empty_leaves_destination_untouched()
{
    let module = BasicModule::new("bridge");
    let mut info = CfiFrameInfo::default();
    info.set_cfa_rule("$esp 4 +");
    let before = info.clone();

    assert_eq!(module.parse_cfi_rule_set("", &mut info), Err(CfiRuleError::Empty));
    assert_eq!(info, before);
}

#[test]
fn test_frame_info_display()
{
    let mut info = CfiFrameInfo::default();
    assert!(info.is_empty());
    assert_eq!(info.to_string(), "");

    info.set_register_rule("$rbx", ".cfa 24 - ^");
    info.set_ra_rule(".cfa 8 - ^");
    info.set_cfa_rule("$rsp 16 +");
    assert_eq!(info.to_string(), ".cfa: $rsp 16 + .ra: .cfa 8 - ^ $rbx: .cfa 24 - ^");
}

#[test]
fn test_find_caller_regs()
{
    let mut info = CfiFrameInfo::default();
    info.set_cfa_rule("$rsp 16 +");
    info.set_ra_rule(".cfa 8 - ^");
    info.set_register_rule("$rbp", ".cfa 16 - ^");

    let memory = WordMemory::default()
        .with(0x7fef_fff8, 0x0040_1234)
        .with(0x7fef_fff0, 0x7ff0_0100);
    let callee = registers(&[("$rsp", 0x7fef_fff0), ("$rbp", 0x7ff0_0000)]);

    let caller = info.find_caller_regs(&callee, &memory).unwrap();

    assert_eq!(caller.get(".cfa"), Some(&0x7ff0_0000));
    assert_eq!(caller.get(".ra"), Some(&0x0040_1234));
    assert_eq!(caller.get("$rbp"), Some(&0x7ff0_0100));
    // Registers without a rule are not carried over.
    assert!(caller.get("$rsp").is_none());
    assert_eq!(caller.len(), 3);
}

#[test]
fn test_find_caller_regs_requires_cfa_and_ra()
{
    let callee = registers(&[("$rsp", 0x1000)]);

    let mut info = CfiFrameInfo::default();
    info.set_ra_rule("0");
    assert_eq!(
        info.find_caller_regs(&callee, &NoMemory),
        Err(EvaluationError::MissingRule(".cfa"))
    );

    let mut info = CfiFrameInfo::default();
    info.set_cfa_rule("$rsp 8 +");
    assert_eq!(
        info.find_caller_regs(&callee, &NoMemory),
        Err(EvaluationError::MissingRule(".ra"))
    );
}

#[test]
fn test_find_caller_regs_cfa_cannot_use_itself()
{
    let mut info = CfiFrameInfo::default();
    info.set_cfa_rule(".cfa 8 +");
    info.set_ra_rule("0");

    assert_eq!(
        info.find_caller_regs(&registers(&[]), &NoMemory),
        Err(EvaluationError::UnknownIdentifier(".cfa".to_string()))
    );
}

#[test]
fn test_find_caller_regs_32_bit()
{
    let mut info = CfiFrameInfo::default();
    info.set_cfa_rule("$esp 4 +");
    info.set_ra_rule(".cfa 4 - ^");

    let memory = WordMemory::default().with(0x1000, 0xaaaa_bbbb_0040_1000);
    let evaluator = PostfixEvaluator::with_pointer_size(&memory, 4);
    let caller = info
        .find_caller_regs_with(&registers(&[("$esp", 0x1000)]), &evaluator)
        .unwrap();

    assert_eq!(caller.get(".cfa"), Some(&0x1004));
    assert_eq!(caller.get(".ra"), Some(&0x0040_1000));
}

#[test]
fn test_evaluate_for_value_arithmetic()
{
    let evaluator = PostfixEvaluator::new(&NoMemory);
    let regs = registers(&[("$rsp", 0x1000), ("sp", 0x20)]);

    assert_eq!(evaluator.evaluate_for_value("$rsp 8 +", &regs), Ok(0x1008));
    assert_eq!(evaluator.evaluate_for_value("sp 3 * 0x10 -", &regs), Ok(0x50));
    assert_eq!(evaluator.evaluate_for_value("17 5 %", &regs), Ok(2));
    assert_eq!(evaluator.evaluate_for_value("17 5 /", &regs), Ok(3));
    assert_eq!(evaluator.evaluate_for_value("$rsp 7 + 16 @", &regs), Ok(0x1000));
    assert_eq!(evaluator.evaluate_for_value("0 1 -", &regs), Ok(u64::MAX));
    assert_eq!(evaluator.evaluate_for_value("-8", &regs), Ok(0u64.wrapping_sub(8)));
}

#[test]
fn test_evaluate_for_value_wraps_at_32_bits()
{
    let evaluator = PostfixEvaluator::with_pointer_size(&NoMemory, 4);
    assert_eq!(evaluator.pointer_size(), 4);
    assert_eq!(evaluator.evaluate_for_value("0xffffffff 1 +", &RegisterValueMap::new()), Ok(0));
    assert_eq!(evaluator.evaluate_for_value("0 4 -", &RegisterValueMap::new()), Ok(0xffff_fffc));
}

#[test]
fn test_evaluate_for_value_errors()
{
    let evaluator = PostfixEvaluator::new(&NoMemory);
    let regs = RegisterValueMap::new();

    assert_eq!(
        evaluator.evaluate_for_value("1 +", &regs),
        Err(EvaluationError::StackUnderflow("+".to_string()))
    );
    assert_eq!(
        evaluator.evaluate_for_value("$eax", &regs),
        Err(EvaluationError::UnknownIdentifier("$eax".to_string()))
    );
    assert_eq!(evaluator.evaluate_for_value("1 0 /", &regs), Err(EvaluationError::DivideByZero));
    assert_eq!(evaluator.evaluate_for_value("1 0 %", &regs), Err(EvaluationError::DivideByZero));
    assert_eq!(evaluator.evaluate_for_value("1 2", &regs), Err(EvaluationError::UnbalancedStack(2)));
    assert_eq!(evaluator.evaluate_for_value("", &regs), Err(EvaluationError::UnbalancedStack(0)));
    assert_eq!(
        evaluator.evaluate_for_value("$a 1 =", &regs),
        Err(EvaluationError::UnexpectedAssignment)
    );
    assert_eq!(
        evaluator.evaluate_for_value("4 ^", &regs),
        Err(EvaluationError::MemoryRead(Address::new(4)))
    );
    assert_eq!(
        evaluator.evaluate_for_value("12abc", &regs),
        Err(EvaluationError::InvalidToken("12abc".to_string()))
    );
}

#[test]
fn test_evaluate_program_with_assignments()
{
    let memory = WordMemory::default().with(0x2000, 0x0040_5000).with(0x2008, 0x3000);
    let evaluator = PostfixEvaluator::new(&memory);
    let mut dictionary = registers(&[("$esp", 0x2000)]);

    evaluator
        .evaluate("$T0 $esp = $eip $T0 ^ = $ebp $T0 8 + ^ = $esp $T0 16 + =", &mut dictionary)
        .unwrap();

    assert_eq!(dictionary.get("$T0"), Some(&0x2000));
    assert_eq!(dictionary.get("$eip"), Some(&0x0040_5000));
    assert_eq!(dictionary.get("$ebp"), Some(&0x3000));
    assert_eq!(dictionary.get("$esp"), Some(&0x2010));
}

#[test]
fn test_evaluate_program_errors()
{
    let evaluator = PostfixEvaluator::new(&NoMemory);
    let mut dictionary = RegisterValueMap::new();

    assert_eq!(evaluator.evaluate("1 2 =", &mut dictionary), Err(EvaluationError::BadAssignment));
    assert_eq!(evaluator.evaluate("$a 1 = 5", &mut dictionary), Err(EvaluationError::UnbalancedStack(1)));
    // The assignment before the failure is kept.
    assert_eq!(dictionary.get("$a"), Some(&1));
}
