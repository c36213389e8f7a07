//! 인프로세스 테스트 엔진
//!
//! [`MockEngine`]은 liblognorm 없이 [`NativeEngine`] 계약을 흉내냅니다.
//! 컨텍스트/결과 핸들을 레지스트리에 기록하므로 테스트에서 누수, 이중 해제,
//! 적용된 옵션을 검사할 수 있습니다.
//!
//! # 지원하는 룰 문법
//!
//! ```text
//! version=2                      (파일 첫 줄, 선택)
//! # comment
//! rule=<tag,...>:<pattern>
//! ```
//!
//! 패턴의 필드: `%name:rest%`, `%name:word%`, `%name:number%`,
//! `%name:char-to:<c>%`, `%name:regex:<expr>%`, 그리고 v2 전용 JSON 형식
//! `%{"type":"rest","name":"all"}%` / `%{"type":"literal","text":"..."}%`.
//! 이름이 `-`인 필드는 값을 버립니다.
//!
//! 네이티브와 같은 방식으로 동작하는 부분:
//! - 잘못된 룰 줄마다 에러 콜백 1회, 로더 반환 코드는 0
//! - 존재하지 않는 파일은 에러 콜백 + 반환 코드 1
//! - 문자열 로더는 항상 v2, 파일 로더는 `version=2` 헤더로 v1/v2 결정
//! - v2의 regex 필드는 에러, v1의 regex 필드는 로드되지만 매칭되지 않음
//! - v2 매칭 실패는 -1000 + `originalmsg`/`unparsed-data` 페이로드
//! - v1 매칭 실패는 성공(0)으로 보고되고 결과 JSON에 `unparsed-data`가 담김
//! - 결과 JSON은 `{ "key": "value" }` 처럼 공백이 들어간 형식

use std::collections::HashMap;
use std::ffi::{CStr, c_int, c_void};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lognorm_core::rule::RULEBASE_V2_HEADER;

use crate::binding::{
    LN_WRONGPARSER, MessageCallback, NativeEngine, OptionsStruct, RawCtx, RawNormalization,
    RawResult,
};

/// 인라인 룰의 위치 정보에 쓰이는 파일 이름
const NO_FILE: &str = "--NO-FILE--";

/// 테스트용 네이티브 엔진
#[derive(Debug)]
pub struct MockEngine {
    version: String,
    advanced_stats: bool,
    fail_init: bool,
    err_cb_code: c_int,
    debug_cb_code: c_int,
    null_results: bool,
    normalize_errors: usize,
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: usize,
    contexts: HashMap<usize, MockContext>,
    results: HashMap<usize, String>,
    contexts_created: usize,
    contexts_released: usize,
    invalid_releases: usize,
    last_options: Option<OptionsStruct>,
}

#[derive(Debug, Default)]
struct MockContext {
    options: OptionsStruct,
    debug: bool,
    err_cb: Option<Callback>,
    debug_cb: Option<Callback>,
    rules: Vec<MockRule>,
    v1: bool,
}

#[derive(Debug, Clone, Copy)]
struct Callback {
    func: MessageCallback,
    cookie: *mut c_void,
}

// SAFETY: cookie는 컨텍스트 소유자가 보장하는 주소이며 엔진은 그 값을
// 전달만 합니다. 호출은 트리거한 스레드에서만 일어납니다.
unsafe impl Send for Callback {}

impl Callback {
    fn fire(&self, message: &str) {
        // SAFETY: 등록 시점의 계약에 따라 cookie는 컨텍스트 해제 전까지 유효합니다.
        unsafe { (self.func)(self.cookie, message.as_ptr().cast(), message.len()) };
    }
}

#[derive(Debug, Clone)]
struct MockRule {
    tags: Vec<String>,
    mockup: String,
    segments: Vec<Segment>,
    file: String,
    line: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field { name: String, kind: FieldKind },
}

#[derive(Debug, Clone, PartialEq)]
enum FieldKind {
    Rest,
    Word,
    Number,
    CharTo(char),
    Regex,
}

/// 매칭 결과
enum Outcome {
    Matched(String),
    Unparsed { payload: String, v1: bool },
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// 모든 호출이 성공하는 엔진을 생성합니다.
    pub fn new() -> Self {
        Self {
            version: "2.0.6".to_owned(),
            advanced_stats: false,
            fail_init: false,
            err_cb_code: 0,
            debug_cb_code: 0,
            null_results: false,
            normalize_errors: 0,
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
        }
    }

    /// `init_ctx`가 null을 반환하도록 합니다.
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// `set_err_msg_cb` 반환 코드를 지정합니다.
    pub fn with_err_cb_code(mut self, code: c_int) -> Self {
        self.err_cb_code = code;
        self
    }

    /// `set_debug_cb` 반환 코드를 지정합니다.
    pub fn with_debug_cb_code(mut self, code: c_int) -> Self {
        self.debug_cb_code = code;
        self
    }

    /// 매칭 여부와 관계없이 `normalize`가 코드 없는 null 결과를 반환하도록 합니다.
    pub fn with_null_results(mut self) -> Self {
        self.null_results = true;
        self
    }

    /// `normalize` 호출마다 에러 콜백을 `count`번 호출합니다.
    pub fn with_normalize_errors(mut self, count: usize) -> Self {
        self.normalize_errors = count;
        self
    }

    /// 보고할 버전 문자열을 지정합니다.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// `has_advanced_stats` 응답을 지정합니다.
    pub fn with_advanced_stats(mut self, enabled: bool) -> Self {
        self.advanced_stats = enabled;
        self
    }

    /// 생성된 컨텍스트 수
    pub fn contexts_created(&self) -> usize {
        self.lock().contexts_created
    }

    /// 해제된 컨텍스트 수
    pub fn contexts_released(&self) -> usize {
        self.lock().contexts_released
    }

    /// 아직 해제되지 않은 컨텍스트 수
    pub fn live_contexts(&self) -> usize {
        self.lock().contexts.len()
    }

    /// 아직 해제되지 않은 결과 수
    pub fn live_results(&self) -> usize {
        self.lock().results.len()
    }

    /// 알 수 없거나 이미 해제된 핸들에 대한 해제 시도 수
    pub fn invalid_releases(&self) -> usize {
        self.lock().invalid_releases
    }

    /// 가장 최근에 적용된 옵션
    pub fn last_options(&self) -> Option<OptionsStruct> {
        self.lock().last_options
    }

    /// 주어진 JSON 텍스트를 담은 결과 핸들을 직접 만듭니다.
    pub fn make_result(&self, json: &str) -> RawResult {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.results.insert(id, json.to_owned());
        handle(id)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 룰 텍스트를 컨텍스트에 로드하고 발생한 콜백을 실행합니다.
    fn load(&self, ctx: RawCtx, text: &str, file: Option<&str>, force_v2: bool) -> c_int {
        let (errors, debug, err_cb, debug_cb) = {
            let mut state = self.lock();
            let Some(context) = state.contexts.get_mut(&ctx.addr()) else {
                return -1;
            };
            let v1 = !force_v2 && !has_v2_header(text);
            let (rules, errors) = parse_rulebase(text, file, v1);
            let mut debug = Vec::new();
            if context.debug {
                debug.push(format!(
                    "loading rulebase from {} ({} parser)",
                    file.unwrap_or("string"),
                    if v1 { "v1" } else { "v2" }
                ));
                for rule in &rules {
                    debug.push(format!("added rule '{}' at line {}", rule.mockup, rule.line));
                }
            }
            context.v1 = v1;
            context.rules.extend(rules);
            (errors, debug, context.err_cb, context.debug_cb)
        };

        fire_all(debug_cb, &debug);
        fire_all(err_cb, &errors);
        0
    }
}

impl MockState {
    fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn handle(id: usize) -> *mut c_void {
    std::ptr::without_provenance_mut(id)
}

fn fire_all(callback: Option<Callback>, messages: &[String]) {
    if let Some(cb) = callback {
        for message in messages {
            cb.fire(message);
        }
    }
}

impl NativeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn has_advanced_stats(&self) -> bool {
        self.advanced_stats
    }

    fn init_ctx(&self) -> RawCtx {
        if self.fail_init {
            return std::ptr::null_mut();
        }
        let mut state = self.lock();
        let id = state.allocate_id();
        state.contexts.insert(id, MockContext::default());
        state.contexts_created += 1;
        handle(id)
    }

    unsafe fn exit_ctx(&self, ctx: RawCtx) -> c_int {
        let mut state = self.lock();
        if state.contexts.remove(&ctx.addr()).is_some() {
            state.contexts_released += 1;
            0
        } else {
            state.invalid_releases += 1;
            -1
        }
    }

    unsafe fn set_ctx_opts(&self, ctx: RawCtx, opts: &OptionsStruct) {
        let mut state = self.lock();
        state.last_options = Some(*opts);
        if let Some(context) = state.contexts.get_mut(&ctx.addr()) {
            context.options = *opts;
        }
    }

    unsafe fn load_samples(&self, ctx: RawCtx, path: &CStr) -> c_int {
        let path = path.to_string_lossy().into_owned();
        match std::fs::read_to_string(Path::new(&path)) {
            Ok(text) => self.load(ctx, &text, Some(&path), false),
            Err(e) => {
                let err_cb = self
                    .lock()
                    .contexts
                    .get(&ctx.addr())
                    .and_then(|c| c.err_cb);
                fire_all(err_cb, &[format!("cannot open rulebase file '{path}': {e}")]);
                1
            }
        }
    }

    unsafe fn load_samples_from_string(&self, ctx: RawCtx, rules: &CStr) -> c_int {
        let text = rules.to_string_lossy().into_owned();
        self.load(ctx, &text, None, true)
    }

    unsafe fn normalize(&self, ctx: RawCtx, text: &CStr) -> RawNormalization {
        let message = text.to_string_lossy().into_owned();

        let (outcome, err_cb, debug_cb, debug) = {
            let state = self.lock();
            let Some(context) = state.contexts.get(&ctx.addr()) else {
                return RawNormalization::failure(-1, None);
            };
            let outcome = match_rules(context, &message);
            (outcome, context.err_cb, context.debug_cb, context.debug)
        };

        if debug {
            fire_all(debug_cb, &[format!("normalizing message '{message}'")]);
        }
        let errors: Vec<String> = (1..=self.normalize_errors)
            .map(|i| format!("normalize error {i}"))
            .collect();
        fire_all(err_cb, &errors);

        if self.null_results {
            return RawNormalization::failure(0, None);
        }

        match outcome {
            Outcome::Matched(json) => RawNormalization::success(self.make_result(&json)),
            Outcome::Unparsed { payload, v1: true } => {
                RawNormalization::success(self.make_result(&payload))
            }
            Outcome::Unparsed { payload, v1: false } => {
                RawNormalization::failure(LN_WRONGPARSER, Some(payload))
            }
        }
    }

    unsafe fn read_result(&self, result: RawResult) -> Option<String> {
        self.lock().results.get(&result.addr()).cloned()
    }

    unsafe fn destroy_result(&self, result: RawResult) {
        let mut state = self.lock();
        if state.results.remove(&result.addr()).is_none() {
            state.invalid_releases += 1;
        }
    }

    unsafe fn enable_debug(&self, ctx: RawCtx, flag: c_int) {
        if let Some(context) = self.lock().contexts.get_mut(&ctx.addr()) {
            context.debug = flag != 0;
        }
    }

    unsafe fn set_debug_cb(&self, ctx: RawCtx, cb: MessageCallback, cookie: *mut c_void) -> c_int {
        if self.debug_cb_code != 0 {
            return self.debug_cb_code;
        }
        match self.lock().contexts.get_mut(&ctx.addr()) {
            Some(context) => {
                context.debug_cb = Some(Callback { func: cb, cookie });
                0
            }
            None => -1,
        }
    }

    unsafe fn set_err_msg_cb(
        &self,
        ctx: RawCtx,
        cb: MessageCallback,
        cookie: *mut c_void,
    ) -> c_int {
        if self.err_cb_code != 0 {
            return self.err_cb_code;
        }
        match self.lock().contexts.get_mut(&ctx.addr()) {
            Some(context) => {
                context.err_cb = Some(Callback { func: cb, cookie });
                0
            }
            None => -1,
        }
    }
}

// ─── 룰 파싱 ───────────────────────────────────────────────────────

fn has_v2_header(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line == RULEBASE_V2_HEADER)
}

/// 룰베이스 텍스트를 파싱합니다. 잘못된 줄마다 에러 메시지 하나를 돌려줍니다.
fn parse_rulebase(text: &str, file: Option<&str>, v1: bool) -> (Vec<MockRule>, Vec<String>) {
    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let location = file.unwrap_or(NO_FILE);

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') || line.trim() == RULEBASE_V2_HEADER {
            continue;
        }
        let line_no = if file.is_some() { idx + 1 } else { 0 };

        match parse_rule_line(line, v1) {
            Ok((tags, mockup, segments)) => rules.push(MockRule {
                tags,
                mockup,
                segments,
                file: location.to_owned(),
                line: line_no,
            }),
            Err(reason) => errors.push(format!("rulebase file {location}[{}]: {reason}", idx + 1)),
        }
    }
    (rules, errors)
}

fn parse_rule_line(line: &str, v1: bool) -> Result<(Vec<String>, String, Vec<Segment>), String> {
    let Some(body) = line.strip_prefix("rule=") else {
        return Err(format!("invalid record type detected: '{line}'"));
    };
    let Some((tags, pattern)) = body.split_once(':') else {
        return Err(format!("invalid rule, missing ':' after tags: '{line}'"));
    };
    let tags = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();
    let segments = parse_pattern(pattern, v1)?;
    Ok((tags, pattern.to_owned(), segments))
}

fn parse_pattern(pattern: &str, v1: bool) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(start) = rest.find('%') {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        // %% 는 리터럴 %
        if let Some(stripped) = after.strip_prefix('%') {
            literal.push('%');
            rest = stripped;
            continue;
        }

        let (segment, remaining) = if after.starts_with('{') {
            if v1 {
                return Err("JSON field definitions require a v2 rulebase".to_owned());
            }
            let end = after
                .find("}%")
                .ok_or_else(|| format!("unterminated field definition: '%{after}'"))?;
            (parse_json_field(&after[..=end])?, &after[end + 2..])
        } else {
            let end = after
                .find('%')
                .ok_or_else(|| format!("unterminated field definition: '%{after}'"))?;
            (parse_field(&after[..end], v1)?, &after[end + 1..])
        };

        match segment {
            Segment::Literal(text) => literal.push_str(&text),
            field => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(field);
            }
        }
        rest = remaining;
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_field(def: &str, v1: bool) -> Result<Segment, String> {
    let mut parts = def.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let kind = parts
        .next()
        .ok_or_else(|| format!("field '{def}' has no type"))?;
    let extra = parts.next();
    if name.is_empty() {
        return Err(format!("field '{def}' has no name"));
    }
    Ok(Segment::Field {
        name: name.to_owned(),
        kind: field_kind(kind, extra, v1)?,
    })
}

fn parse_json_field(def: &str) -> Result<Segment, String> {
    let value: serde_json::Value =
        serde_json::from_str(def).map_err(|e| format!("invalid JSON field definition: {e}"))?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| "JSON field definition has no type".to_owned())?;

    if kind == "literal" {
        let text = value
            .get("text")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| "literal field definition has no text".to_owned())?;
        return Ok(Segment::Literal(text.to_owned()));
    }

    let name = value
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("-");
    let extra = value.get("extradata").and_then(serde_json::Value::as_str);
    Ok(Segment::Field {
        name: name.to_owned(),
        kind: field_kind(kind, extra, false)?,
    })
}

fn field_kind(kind: &str, extra: Option<&str>, v1: bool) -> Result<FieldKind, String> {
    match kind {
        "rest" => Ok(FieldKind::Rest),
        "word" => Ok(FieldKind::Word),
        "number" => Ok(FieldKind::Number),
        "char-to" => extra
            .and_then(|e| e.chars().next())
            .map(FieldKind::CharTo)
            .ok_or_else(|| "char-to field requires a delimiter".to_owned()),
        "regex" if v1 => Ok(FieldKind::Regex),
        "regex" => Err("regex field type is not supported by the v2 parser".to_owned()),
        other => Err(format!("invalid field type '{other}'")),
    }
}

// ─── 매칭 ──────────────────────────────────────────────────────────

fn match_rules(context: &MockContext, message: &str) -> Outcome {
    let mut furthest = 0;
    for rule in &context.rules {
        match match_rule(rule, message) {
            Ok(fields) => return Outcome::Matched(render_match(context, rule, message, &fields)),
            Err(offset) => furthest = furthest.max(offset),
        }
    }

    let mut payload = JsonObject::new();
    payload.string("originalmsg", message);
    payload.string("unparsed-data", &message[furthest..]);
    Outcome::Unparsed {
        payload: payload.render(),
        v1: context.v1,
    }
}

/// 룰 하나를 매칭합니다. 실패 시 매칭이 멈춘 바이트 오프셋을 반환합니다.
fn match_rule(rule: &MockRule, message: &str) -> Result<Vec<(String, String)>, usize> {
    let mut fields = Vec::new();
    let mut pos = 0;

    for segment in &rule.segments {
        let rest = &message[pos..];
        match segment {
            Segment::Literal(text) => {
                if !rest.starts_with(text.as_str()) {
                    return Err(pos);
                }
                pos += text.len();
            }
            Segment::Field { name, kind } => {
                let len = match kind {
                    FieldKind::Rest => rest.len(),
                    FieldKind::Word => rest.find(' ').unwrap_or(rest.len()),
                    FieldKind::Number => rest
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(rest.len()),
                    FieldKind::CharTo(delim) => rest.find(*delim).ok_or(pos)?,
                    FieldKind::Regex => return Err(pos),
                };
                if len == 0 && *kind != FieldKind::Rest {
                    return Err(pos);
                }
                if name != "-" {
                    fields.push((name.clone(), rest[..len].to_owned()));
                }
                pos += len;
            }
        }
    }

    if pos == message.len() { Ok(fields) } else { Err(pos) }
}

fn render_match(
    context: &MockContext,
    rule: &MockRule,
    message: &str,
    fields: &[(String, String)],
) -> String {
    let mut out = JsonObject::new();
    for (name, value) in fields {
        out.string(name, value);
    }
    if !rule.tags.is_empty() {
        out.raw("event.tags", render_string_array(&rule.tags));
    }
    if context.options.ctxopt_add_originalmsg != 0 {
        out.string("originalmsg", message);
    }

    let add_rule = context.options.ctxopt_add_rule != 0;
    let add_location = context.options.ctxopt_add_rule_location != 0;
    if add_rule || add_location {
        let mut rule_obj = JsonObject::new();
        if add_rule {
            rule_obj.string("mockup", &rule.mockup);
        }
        if add_location {
            let mut location = JsonObject::new();
            location.string("file", &rule.file);
            location.raw("line", rule.line.to_string());
            rule_obj.raw("location", location.render());
        }
        let mut metadata = JsonObject::new();
        metadata.raw("rule", rule_obj.render());
        out.raw("metadata", metadata.render());
    }
    out.render()
}

// ─── JSON 출력 (공백이 들어간 네이티브 형식) ───────────────────────

struct JsonObject {
    entries: Vec<(String, String)>,
}

impl JsonObject {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn string(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_owned(), quote(value)));
    }

    fn raw(&mut self, key: &str, rendered: String) {
        self.entries.push((key.to_owned(), rendered));
    }

    fn render(&self) -> String {
        if self.entries.is_empty() {
            return "{ }".to_owned();
        }
        let mut out = String::from("{ ");
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {}", quote(key), value);
        }
        out.push_str(" }");
        out
    }
}

fn render_string_array(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("[ {} ]", quoted.join(", "))
}

fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
