//! Runtime effects and their builder.
//!
//! Effect "compilation" only extracts the declarations the binding cares
//! about: `uniform <type> <name>;` statements become uniforms, `uniform shader`,
//! `uniform colorFilter` and `uniform blender` become children, and a `main(`
//! entry point must be present. Uniform and child handles are views into the
//! effect and stay valid while the effect is alive.

use crate::effects::{new_shader, ShaderKind};
use crate::heap::{self, ObjectKind};
use crate::refcnt::{ref_base, unref_base, RefCntBase};
use crate::string::{string_mut, string_ref};
use crate::types::{
    sk_runtimeeffect_child_t, sk_runtimeeffect_child_type_t, sk_runtimeeffect_kind_t,
    sk_runtimeeffect_t, sk_runtimeeffect_uniform_t, sk_runtimeeffect_uniform_type_t,
    sk_runtimeeffectbuilder_t, sk_shader_t, sk_string_t,
};
use std::ffi::{c_char, CStr, CString};

#[repr(C)]
pub(crate) struct RuntimeEffect {
    base: RefCntBase,
    kind: sk_runtimeeffect_kind_t,
    uniforms: Vec<Box<Uniform>>,
    children: Vec<Box<Child>>,
    uniform_size: usize,
}

pub(crate) struct Uniform {
    name: CString,
    ty: sk_runtimeeffect_uniform_type_t,
    offset: usize,
}

pub(crate) struct Child {
    name: CString,
    ty: sk_runtimeeffect_child_type_t,
    index: usize,
}

impl RuntimeEffect {
    fn uniform(&self, name: &CStr) -> Option<&Uniform> {
        self.uniforms.iter().map(Box::as_ref).find(|u| u.name.as_c_str() == name)
    }

    fn child(&self, name: &CStr) -> Option<&Child> {
        self.children.iter().map(Box::as_ref).find(|c| c.name.as_c_str() == name)
    }
}

unsafe fn destroy_effect(base: *mut RefCntBase) {
    heap::free(base as *mut RuntimeEffect);
}

struct Declarations {
    uniforms: Vec<Box<Uniform>>,
    children: Vec<Box<Child>>,
    uniform_size: usize,
}

fn uniform_type(name: &str) -> Option<sk_runtimeeffect_uniform_type_t> {
    use sk_runtimeeffect_uniform_type_t::*;
    Some(match name {
        "float" | "half" => Float,
        "float2" | "half2" => Float2,
        "float3" | "half3" => Float3,
        "float4" | "half4" => Float4,
        "float2x2" | "half2x2" => Float2x2,
        "float3x3" | "half3x3" => Float3x3,
        "float4x4" | "half4x4" => Float4x4,
        "int" => Int,
        "int2" => Int2,
        "int3" => Int3,
        "int4" => Int4,
        _ => return None,
    })
}

fn child_type(name: &str) -> Option<sk_runtimeeffect_child_type_t> {
    match name {
        "shader" => Some(sk_runtimeeffect_child_type_t::Shader),
        "colorFilter" => Some(sk_runtimeeffect_child_type_t::ColorFilter),
        "blender" => Some(sk_runtimeeffect_child_type_t::Blender),
        _ => None,
    }
}

fn parse(source: &str) -> Result<Declarations, String> {
    let mut decls = Declarations {
        uniforms: Vec::new(),
        children: Vec::new(),
        uniform_size: 0,
    };
    let mut line = 1;
    for statement in source.split(';') {
        let leading = &statement[..statement.len() - statement.trim_start().len()];
        let start_line = line + leading.matches('\n').count();
        line += statement.matches('\n').count();
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        if tokens.first() != Some(&"uniform") {
            continue;
        }
        let (ty, name) = match tokens.as_slice() {
            [_, ty, name] => (*ty, *name),
            _ => return Err(format!("error: {start_line}: malformed uniform declaration")),
        };
        let taken = decls.uniforms.iter().any(|u| u.name.as_bytes() == name.as_bytes())
            || decls.children.iter().any(|c| c.name.as_bytes() == name.as_bytes());
        if taken {
            return Err(format!("error: {start_line}: symbol '{name}' was already defined"));
        }
        let Ok(c_name) = CString::new(name) else {
            return Err(format!("error: {start_line}: invalid name"));
        };
        if let Some(ty) = child_type(ty) {
            let index = decls.children.len();
            decls.children.push(Box::new(Child {
                name: c_name,
                ty,
                index,
            }));
        } else if let Some(ty) = uniform_type(ty) {
            decls.uniforms.push(Box::new(Uniform {
                name: c_name,
                ty,
                offset: decls.uniform_size,
            }));
            decls.uniform_size += ty.size_in_bytes();
        } else {
            return Err(format!("error: {start_line}: unknown type '{ty}'"));
        }
    }
    if !source.contains("main(") {
        return Err("error: 1: missing 'main' function".to_string());
    }
    Ok(decls)
}

unsafe fn make_effect(
    kind: sk_runtimeeffect_kind_t,
    sksl: *const sk_string_t,
    error: *mut sk_string_t,
) -> *mut sk_runtimeeffect_t {
    let Some(source) = string_ref(sksl) else {
        return std::ptr::null_mut();
    };
    let result = std::str::from_utf8(source.as_bytes())
        .map_err(|_| "error: 1: source is not valid UTF-8".to_string())
        .and_then(parse);
    match result {
        Ok(decls) => heap::alloc(
            ObjectKind::RuntimeEffect,
            RuntimeEffect {
                base: RefCntBase::new(destroy_effect),
                kind,
                uniforms: decls.uniforms,
                children: decls.children,
                uniform_size: decls.uniform_size,
            },
        ) as *mut sk_runtimeeffect_t,
        Err(message) => {
            if let Some(error) = string_mut(error) {
                error.set(message.as_bytes());
            }
            std::ptr::null_mut()
        }
    }
}

unsafe fn effect<'a>(effect: *const sk_runtimeeffect_t, operation: &'static str) -> Option<&'a RuntimeEffect> {
    if heap::check_live(effect as usize, operation) {
        Some(&*(effect as *const RuntimeEffect))
    } else {
        None
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_make_for_shader(
    sksl: *const sk_string_t,
    error: *mut sk_string_t,
) -> *mut sk_runtimeeffect_t {
    make_effect(sk_runtimeeffect_kind_t::Shader, sksl, error)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_make_for_color_filter(
    sksl: *const sk_string_t,
    error: *mut sk_string_t,
) -> *mut sk_runtimeeffect_t {
    make_effect(sk_runtimeeffect_kind_t::ColorFilter, sksl, error)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_make_for_blender(
    sksl: *const sk_string_t,
    error: *mut sk_string_t,
) -> *mut sk_runtimeeffect_t {
    make_effect(sk_runtimeeffect_kind_t::Blender, sksl, error)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_unref(effect: *mut sk_runtimeeffect_t) {
    if !effect.is_null() {
        unref_base(effect as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_kind(effect: *const sk_runtimeeffect_t) -> sk_runtimeeffect_kind_t {
    self::effect(effect, "runtimeeffect_get_kind").map_or(sk_runtimeeffect_kind_t::Shader, |e| e.kind)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_uniform_byte_size(effect: *const sk_runtimeeffect_t) -> usize {
    self::effect(effect, "runtimeeffect_get_uniform_byte_size").map_or(0, |e| e.uniform_size)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_uniforms_size(effect: *const sk_runtimeeffect_t) -> usize {
    self::effect(effect, "runtimeeffect_get_uniforms_size").map_or(0, |e| e.uniforms.len())
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_children_size(effect: *const sk_runtimeeffect_t) -> usize {
    self::effect(effect, "runtimeeffect_get_children_size").map_or(0, |e| e.children.len())
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_uniform_from_index(
    effect: *const sk_runtimeeffect_t,
    index: usize,
) -> *const sk_runtimeeffect_uniform_t {
    self::effect(effect, "runtimeeffect_get_uniform_from_index")
        .and_then(|e| e.uniforms.get(index))
        .map_or(std::ptr::null(), |u| u.as_ref() as *const Uniform as *const _)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_uniform_from_name(
    effect: *const sk_runtimeeffect_t,
    name: *const c_char,
) -> *const sk_runtimeeffect_uniform_t {
    if name.is_null() {
        return std::ptr::null();
    }
    let name = CStr::from_ptr(name);
    self::effect(effect, "runtimeeffect_get_uniform_from_name")
        .and_then(|e| e.uniform(name))
        .map_or(std::ptr::null(), |u| u as *const Uniform as *const _)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_child_from_index(
    effect: *const sk_runtimeeffect_t,
    index: usize,
) -> *const sk_runtimeeffect_child_t {
    self::effect(effect, "runtimeeffect_get_child_from_index")
        .and_then(|e| e.children.get(index))
        .map_or(std::ptr::null(), |c| c.as_ref() as *const Child as *const _)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_get_child_from_name(
    effect: *const sk_runtimeeffect_t,
    name: *const c_char,
) -> *const sk_runtimeeffect_child_t {
    if name.is_null() {
        return std::ptr::null();
    }
    let name = CStr::from_ptr(name);
    self::effect(effect, "runtimeeffect_get_child_from_name")
        .and_then(|e| e.child(name))
        .map_or(std::ptr::null(), |c| c as *const Child as *const _)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_uniform_get_name(
    uniform: *const sk_runtimeeffect_uniform_t,
) -> *const c_char {
    match (uniform as *const Uniform).as_ref() {
        Some(uniform) => uniform.name.as_ptr(),
        None => std::ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_uniform_get_offset(uniform: *const sk_runtimeeffect_uniform_t) -> usize {
    (uniform as *const Uniform).as_ref().map_or(0, |u| u.offset)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_uniform_get_size_in_bytes(
    uniform: *const sk_runtimeeffect_uniform_t,
) -> usize {
    (uniform as *const Uniform).as_ref().map_or(0, |u| u.ty.size_in_bytes())
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_uniform_get_type(
    uniform: *const sk_runtimeeffect_uniform_t,
) -> sk_runtimeeffect_uniform_type_t {
    (uniform as *const Uniform)
        .as_ref()
        .map_or(sk_runtimeeffect_uniform_type_t::Float, |u| u.ty)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_child_get_name(child: *const sk_runtimeeffect_child_t) -> *const c_char {
    match (child as *const Child).as_ref() {
        Some(child) => child.name.as_ptr(),
        None => std::ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_child_get_type(
    child: *const sk_runtimeeffect_child_t,
) -> sk_runtimeeffect_child_type_t {
    (child as *const Child)
        .as_ref()
        .map_or(sk_runtimeeffect_child_type_t::Shader, |c| c.ty)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtimeeffect_child_get_index(child: *const sk_runtimeeffect_child_t) -> usize {
    (child as *const Child).as_ref().map_or(0, |c| c.index)
}

// ============================================================================
// Builder
// ============================================================================

pub(crate) struct RuntimeEffectBuilder {
    /// One reference, released on drop.
    effect: *mut RuntimeEffect,
    uniforms: Vec<u8>,
    /// One reference per non-null entry.
    children: Vec<*mut RefCntBase>,
}

impl Drop for RuntimeEffectBuilder {
    fn drop(&mut self) {
        // SAFETY: see field docs.
        unsafe {
            for child in self.children.iter().filter(|c| !c.is_null()) {
                unref_base(*child);
            }
            unref_base(self.effect as *mut RefCntBase);
        }
    }
}

unsafe fn builder<'a>(
    builder: *mut sk_runtimeeffectbuilder_t,
    operation: &'static str,
) -> Option<&'a mut RuntimeEffectBuilder> {
    if heap::check_live(builder as usize, operation) {
        Some(&mut *(builder as *mut RuntimeEffectBuilder))
    } else {
        None
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_new(
    effect: *mut sk_runtimeeffect_t,
) -> *mut sk_runtimeeffectbuilder_t {
    let Some(source) = self::effect(effect, "runtime_effect_builder_new") else {
        return std::ptr::null_mut();
    };
    let uniforms = vec![0u8; source.uniform_size];
    let children = vec![std::ptr::null_mut(); source.children.len()];
    ref_base(effect as *mut RefCntBase);
    heap::alloc(
        ObjectKind::RuntimeEffectBuilder,
        RuntimeEffectBuilder {
            effect: effect as *mut RuntimeEffect,
            uniforms,
            children,
        },
    ) as *mut sk_runtimeeffectbuilder_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_delete(builder: *mut sk_runtimeeffectbuilder_t) {
    heap::free(builder as *mut RuntimeEffectBuilder);
}

/// Returns the builder's effect without adding a reference.
#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_get_effect(
    builder: *mut sk_runtimeeffectbuilder_t,
) -> *mut sk_runtimeeffect_t {
    match self::builder(builder, "runtime_effect_builder_get_effect") {
        Some(builder) => builder.effect as *mut sk_runtimeeffect_t,
        None => std::ptr::null_mut(),
    }
}

unsafe fn set_uniform_bytes(
    builder: *mut sk_runtimeeffectbuilder_t,
    name: *const c_char,
    bytes: &[u8],
    integer: bool,
) -> bool {
    if name.is_null() {
        return false;
    }
    let Some(builder) = self::builder(builder, "runtime_effect_builder_set_uniform") else {
        return false;
    };
    let effect = &*builder.effect;
    let Some(uniform) = effect.uniform(CStr::from_ptr(name)) else {
        return false;
    };
    if uniform.ty.is_integer() != integer || uniform.ty.size_in_bytes() != bytes.len() {
        return false;
    }
    builder.uniforms[uniform.offset..uniform.offset + bytes.len()].copy_from_slice(bytes);
    true
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_set_uniform_float(
    builder: *mut sk_runtimeeffectbuilder_t,
    name: *const c_char,
    values: *const f32,
    count: usize,
) -> bool {
    if values.is_null() && count > 0 {
        return false;
    }
    let values = if count == 0 { &[][..] } else { std::slice::from_raw_parts(values, count) };
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    set_uniform_bytes(builder, name, &bytes, false)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_set_uniform_int(
    builder: *mut sk_runtimeeffectbuilder_t,
    name: *const c_char,
    values: *const i32,
    count: usize,
) -> bool {
    if values.is_null() && count > 0 {
        return false;
    }
    let values = if count == 0 { &[][..] } else { std::slice::from_raw_parts(values, count) };
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    set_uniform_bytes(builder, name, &bytes, true)
}

#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_set_child_shader(
    builder: *mut sk_runtimeeffectbuilder_t,
    name: *const c_char,
    shader: *mut sk_shader_t,
) -> bool {
    if name.is_null() {
        return false;
    }
    let Some(builder) = self::builder(builder, "runtime_effect_builder_set_child_shader") else {
        return false;
    };
    let effect = &*builder.effect;
    let Some(child) = effect.child(CStr::from_ptr(name)) else {
        return false;
    };
    if child.ty != sk_runtimeeffect_child_type_t::Shader {
        return false;
    }
    let shader = shader as *mut RefCntBase;
    if !shader.is_null() {
        ref_base(shader);
    }
    let old = std::mem::replace(&mut builder.children[child.index], shader);
    if !old.is_null() {
        unref_base(old);
    }
    true
}

/// Returns a new shader, or null when the effect is not a shader effect.
#[no_mangle]
pub unsafe extern "C" fn sk_runtime_effect_builder_make_shader(
    builder: *mut sk_runtimeeffectbuilder_t,
) -> *mut sk_shader_t {
    let Some(builder) = self::builder(builder, "runtime_effect_builder_make_shader") else {
        return std::ptr::null_mut();
    };
    if (*builder.effect).kind != sk_runtimeeffect_kind_t::Shader {
        return std::ptr::null_mut();
    }
    let effect = builder.effect as *mut RefCntBase;
    ref_base(effect);
    for child in builder.children.iter().filter(|c| !c.is_null()) {
        ref_base(*child);
    }
    new_shader(ShaderKind::Runtime {
        effect,
        uniforms: builder.uniforms.clone(),
        children: builder.children.clone(),
    })
}
