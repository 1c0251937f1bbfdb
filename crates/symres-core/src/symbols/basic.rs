//! # Basic Module
//!
//! In-memory symbol tables parsed from the line-oriented text symbol format.
//!
//! ## Record Format
//!
//! Fields are separated by single spaces; numbers are hex unless noted. Names
//! are always the last field and may contain spaces.
//!
//! ```text
//! MODULE <os> <cpu> <id> <name>
//! INFO <anything>
//! FILE <file id (decimal)> <path>
//! FUNC [m] <address> <size> <parameter size> <name>
//! <address> <size> <line (decimal)> <file id (decimal)>
//! PUBLIC [m] <address> <parameter size> <name>
//! STACK WIN <type> <rva> <code size> <prologue> <epilogue> <parameters>
//!           <saved registers> <locals> <max stack> <has program string>
//!           <program string | allocates base pointer>
//! STACK CFI INIT <address> <size> <rules>
//! STACK CFI <address> <rules>
//! ```
//!
//! Line records belong to the closest preceding `FUNC`. `INLINE` and
//! `INLINE_ORIGIN` records are accepted but not used. All addresses are
//! relative to the module's load address.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::buffer::SymbolBuffer;
use super::demangle::make_symbol_name;
use super::module::{ModuleFactory, SymbolModule};
use super::range_map::RangeMap;
use crate::error::SymbolParseError;
use crate::types::{FrameInfoValidity, StackFrame, StackInfoType, WindowsFrameInfo};
use crate::unwind::CfiFrameInfo;

/// Contents of the `MODULE` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader
{
    pub os: String,
    pub cpu: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
struct Line
{
    line: u32,
    file_id: u32,
}

#[derive(Debug, Clone)]
struct Function
{
    name: String,
    parameter_size: u32,
    lines: RangeMap<Line>,
}

#[derive(Debug, Clone)]
struct PublicSymbol
{
    name: String,
    parameter_size: u32,
}

/// A `FUNC` record whose line records are still being collected.
struct PendingFunction
{
    base: u64,
    size: u64,
    function: Function,
}

/// Symbol tables for one module, built from a text symbol file.
#[derive(Debug, Default)]
pub struct BasicModule
{
    name: String,
    header: Option<ModuleHeader>,
    files: HashMap<u32, String>,
    functions: RangeMap<Function>,
    public_symbols: BTreeMap<u64, PublicSymbol>,
    frame_data_info: RangeMap<WindowsFrameInfo>,
    fpo_info: RangeMap<WindowsFrameInfo>,
    cfi_initial_rules: RangeMap<String>,
    cfi_delta_rules: BTreeMap<u64, String>,
}

impl BasicModule
{
    pub fn new(name: impl Into<String>) -> Self
    {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The `MODULE` record, if the symbol file had one.
    pub fn header(&self) -> Option<&ModuleHeader>
    {
        self.header.as_ref()
    }

    pub fn function_count(&self) -> usize
    {
        self.functions.len()
    }

    pub fn public_symbol_count(&self) -> usize
    {
        self.public_symbols.len()
    }

    /// Source file name for a `FILE` id.
    pub fn file_name(&self, id: u32) -> Option<&str>
    {
        self.files.get(&id).map(String::as_str)
    }

    fn parse(&mut self, text: &str) -> Result<(), SymbolParseError>
    {
        let mut pending: Option<PendingFunction> = None;
        let mut seen_record = false;

        for (index, raw_line) in text.lines().enumerate() {
            let number = index + 1;
            let line = raw_line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }

            let err = |reason: &str| SymbolParseError::new(number, reason);
            let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));

            match keyword {
                "INLINE" | "INLINE_ORIGIN" => {}
                "INFO" => {}
                "MODULE" => {
                    if seen_record {
                        return Err(err("MODULE record found after the start of the file"));
                    }
                    self.header = Some(parse_module(rest).ok_or_else(|| err("malformed MODULE record"))?);
                }
                "FILE" => {
                    let (id, name) = parse_file(rest).ok_or_else(|| err("malformed FILE record"))?;
                    self.files.insert(id, name);
                }
                "FUNC" => {
                    self.finish_function(pending.take());
                    pending = Some(parse_func(rest).ok_or_else(|| err("malformed FUNC record"))?);
                }
                "PUBLIC" => {
                    self.finish_function(pending.take());
                    let (address, symbol) = parse_public(rest).ok_or_else(|| err("malformed PUBLIC record"))?;
                    self.store_public(address, symbol);
                }
                "STACK" => {
                    self.finish_function(pending.take());
                    self.parse_stack(rest).ok_or_else(|| err("malformed STACK record"))?;
                }
                _ if keyword.bytes().all(|b| b.is_ascii_hexdigit()) => {
                    let Some(current) = pending.as_mut() else {
                        return Err(err("line record outside of a FUNC"));
                    };
                    let (base, size, record) = parse_line_record(line).ok_or_else(|| err("malformed line record"))?;
                    // Zero-sized line records carry no address range.
                    if size > 0 && !current.function.lines.store(base, size, record) {
                        debug!("{}: dropping overlapping line record at line {number}", self.name);
                    }
                }
                _ => return Err(err("unknown record type")),
            }
            seen_record = true;
        }

        self.finish_function(pending);
        Ok(())
    }

    fn finish_function(&mut self, pending: Option<PendingFunction>)
    {
        let Some(PendingFunction { base, size, function }) = pending else {
            return;
        };
        let name = function.name.clone();
        if !self.functions.store(base, size, function) {
            warn!("{}: dropping FUNC {name} at {base:#x} (empty or overlapping range)", self.name);
        }
    }

    fn store_public(&mut self, address: u64, symbol: PublicSymbol)
    {
        // Some producers emit PUBLIC records at address 0; they would all collide
        // and cannot be meaningful, so they are accepted and ignored.
        if address == 0 {
            return;
        }
        self.public_symbols.entry(address).or_insert(symbol);
    }

    fn parse_stack(&mut self, rest: &str) -> Option<()>
    {
        let (kind, rest) = rest.split_once(' ')?;
        match kind {
            "WIN" => self.parse_stack_win(rest),
            "CFI" => {
                if let Some(init) = rest.strip_prefix("INIT ") {
                    let mut fields = Fields::new(init);
                    let address = parse_hex(fields.next()?)?;
                    let size = parse_hex(fields.next()?)?;
                    let rules = fields.rest().filter(|rules| !rules.is_empty())?;
                    if !self.cfi_initial_rules.store(address, size, rules.to_string()) {
                        warn!("{}: dropping STACK CFI INIT at {address:#x} (empty or overlapping range)", self.name);
                    }
                } else {
                    let mut fields = Fields::new(rest);
                    let address = parse_hex(fields.next()?)?;
                    let rules = fields.rest().filter(|rules| !rules.is_empty())?;
                    self.cfi_delta_rules.insert(address, rules.to_string());
                }
                Some(())
            }
            _ => None,
        }
    }

    fn parse_stack_win(&mut self, rest: &str) -> Option<()>
    {
        let mut fields = Fields::new(rest);
        let raw_type = parse_hex_u32(fields.next()?)?;
        let rva = parse_hex(fields.next()?)?;
        let code_size = parse_hex(fields.next()?)?;
        let mut numbers = [0_u32; 6];
        for slot in &mut numbers {
            *slot = parse_hex_u32(fields.next()?)?;
        }
        let has_program_string = match fields.next()? {
            "0" => false,
            "1" => true,
            _ => return None,
        };
        let last = fields.rest()?;

        let kind = StackInfoType::from_raw(raw_type);
        if (kind == StackInfoType::FrameData) != has_program_string {
            warn!(
                "{}: STACK WIN at {rva:#x} has type {raw_type} but has_program_string={has_program_string}, discarding",
                self.name
            );
            return Some(());
        }

        let [prologue_size, epilogue_size, parameter_size, saved_register_size, local_size, max_stack_size] =
            numbers;
        let (program_string, allocates_base_pointer) = if has_program_string {
            (Some(last.to_string()), false)
        } else {
            (None, parse_hex(last)? != 0)
        };
        let info = WindowsFrameInfo {
            kind,
            valid: FrameInfoValidity::All,
            prologue_size,
            epilogue_size,
            parameter_size,
            saved_register_size,
            local_size,
            max_stack_size,
            allocates_base_pointer,
            program_string,
        };

        let table = match kind {
            StackInfoType::FrameData => &mut self.frame_data_info,
            StackInfoType::Fpo => &mut self.fpo_info,
            _ => return Some(()),
        };
        if !table.store(rva, code_size, info) {
            debug!("{}: dropping overlapping STACK WIN at {rva:#x}", self.name);
        }
        Some(())
    }

    /// The function containing `address`, plus the nearest function base at or
    /// below it (which bounds how far a public symbol can reach).
    fn function_at(&self, address: u64) -> (Option<(u64, &Function)>, Option<u64>)
    {
        match self.functions.retrieve_nearest(address) {
            Some((base, size, function)) if address - base < size => (Some((base, function)), Some(base)),
            Some((base, _, _)) => (None, Some(base)),
            None => (None, None),
        }
    }

    /// The nearest public symbol at or below `address`, unless a function starts
    /// between them.
    fn public_at(&self, address: u64, nearest_function: Option<u64>) -> Option<(u64, &PublicSymbol)>
    {
        let (&public_address, symbol) = self.public_symbols.range(..=address).next_back()?;
        match nearest_function {
            Some(function_base) if public_address <= function_base => None,
            _ => Some((public_address, symbol)),
        }
    }
}

impl SymbolModule for BasicModule
{
    fn name(&self) -> &str
    {
        &self.name
    }

    fn load_map_from_memory(&mut self, buffer: &SymbolBuffer) -> Result<(), SymbolParseError>
    {
        let text = String::from_utf8_lossy(buffer.text());
        if matches!(text, Cow::Owned(_)) {
            debug!("{}: symbol data is not valid UTF-8, decoding lossily", self.name);
        }
        self.parse(&text)?;
        debug!(
            "{}: loaded {} functions, {} public symbols",
            self.name,
            self.functions.len(),
            self.public_symbols.len()
        );
        Ok(())
    }

    fn look_up_address(&self, frame: &mut StackFrame)
    {
        let (Some(module), Some(address)) = (frame.module.clone(), frame.module_offset()) else {
            return;
        };
        let base = module.base_address();

        let (function, nearest_function) = self.function_at(address);
        if let Some((function_base, function)) = function {
            frame.function_name = Some(make_symbol_name(function.name.clone()));
            frame.function_base = Some(base + function_base);
            if let Some((line_base, _, line)) = function.lines.retrieve(address) {
                if let Some(file) = self.files.get(&line.file_id) {
                    frame.source_file_name = Some(file.clone());
                }
                frame.source_line = Some(line.line);
                frame.source_line_base = Some(base + line_base);
            }
        } else if let Some((public_address, symbol)) = self.public_at(address, nearest_function) {
            frame.function_name = Some(make_symbol_name(symbol.name.clone()));
            frame.function_base = Some(base + public_address);
        }
    }

    fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<WindowsFrameInfo>
    {
        let address = frame.module_offset()?;

        if let Some((_, _, info)) = self
            .frame_data_info
            .retrieve(address)
            .or_else(|| self.fpo_info.retrieve(address))
        {
            return Some(info.clone());
        }

        // Without a STACK WIN record, the parameter size from FUNC or PUBLIC is
        // still useful to the stack walker.
        let (function, nearest_function) = self.function_at(address);
        if let Some((_, function)) = function {
            return Some(WindowsFrameInfo::with_parameter_size(function.parameter_size));
        }
        self.public_at(address, nearest_function)
            .map(|(_, symbol)| WindowsFrameInfo::with_parameter_size(symbol.parameter_size))
    }

    fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<CfiFrameInfo>
    {
        let address = frame.module_offset()?;
        let (initial_base, _, initial_rules) = self.cfi_initial_rules.retrieve(address)?;

        let mut info = CfiFrameInfo::default();
        self.parse_cfi_rule_set(initial_rules, &mut info).ok()?;

        for (_, rules) in self.cfi_delta_rules.range(initial_base..=address) {
            // A bad delta leaves the rules already in effect usable.
            let _ = self.parse_cfi_rule_set(rules, &mut info);
        }
        Some(info)
    }
}

/// Creates [`BasicModule`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicModuleFactory;

impl ModuleFactory for BasicModuleFactory
{
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>
    {
        Box::new(BasicModule::new(name))
    }
}

/// Splits space-separated fields off the front of a record.
struct Fields<'a>
{
    rest: Option<&'a str>,
}

impl<'a> Fields<'a>
{
    fn new(input: &'a str) -> Self
    {
        Self { rest: Some(input) }
    }

    /// Everything not yet consumed, spaces included.
    fn rest(self) -> Option<&'a str>
    {
        self.rest
    }

    /// Consume a leading `m` (multiple) marker if present.
    fn skip_multiple(&mut self)
    {
        if let Some(rest) = self.rest {
            if let Some(stripped) = rest.strip_prefix("m ") {
                self.rest = Some(stripped);
            }
        }
    }
}

impl<'a> Iterator for Fields<'a>
{
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str>
    {
        let rest = self.rest?;
        match rest.split_once(' ') {
            Some((field, tail)) => {
                self.rest = Some(tail);
                Some(field)
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

fn parse_hex(field: &str) -> Option<u64>
{
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(field, 16).ok()
}

fn parse_hex_u32(field: &str) -> Option<u32>
{
    parse_hex(field).and_then(|value| u32::try_from(value).ok())
}

fn parse_decimal(field: &str) -> Option<u32>
{
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_module(rest: &str) -> Option<ModuleHeader>
{
    let mut fields = Fields::new(rest);
    let os = fields.next()?.to_string();
    let cpu = fields.next()?.to_string();
    let id = fields.next()?.to_string();
    let name = fields.rest().filter(|name| !name.is_empty())?.to_string();
    Some(ModuleHeader { os, cpu, id, name })
}

fn parse_file(rest: &str) -> Option<(u32, String)>
{
    let mut fields = Fields::new(rest);
    let id = parse_decimal(fields.next()?)?;
    let name = fields.rest().filter(|name| !name.is_empty())?;
    Some((id, name.to_string()))
}

fn parse_func(rest: &str) -> Option<PendingFunction>
{
    let mut fields = Fields::new(rest);
    fields.skip_multiple();
    let base = parse_hex(fields.next()?)?;
    let size = parse_hex(fields.next()?)?;
    let parameter_size = parse_hex_u32(fields.next()?)?;
    let name = fields.rest()?.to_string();
    Some(PendingFunction {
        base,
        size,
        function: Function {
            name,
            parameter_size,
            lines: RangeMap::default(),
        },
    })
}

fn parse_public(rest: &str) -> Option<(u64, PublicSymbol)>
{
    let mut fields = Fields::new(rest);
    fields.skip_multiple();
    let address = parse_hex(fields.next()?)?;
    let parameter_size = parse_hex_u32(fields.next()?)?;
    let name = fields.rest()?.to_string();
    Some((address, PublicSymbol { name, parameter_size }))
}

fn parse_line_record(line: &str) -> Option<(u64, u64, Line)>
{
    let mut fields = Fields::new(line);
    let base = parse_hex(fields.next()?)?;
    let size = parse_hex(fields.next()?)?;
    let line_number = parse_decimal(fields.next()?)?;
    let file_id = parse_decimal(fields.next()?)?;
    if fields.next().is_some() {
        return None;
    }
    Some((
        base,
        size,
        Line {
            line: line_number,
            file_id,
        },
    ))
}
