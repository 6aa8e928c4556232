use std::ffi::CStr;

use aero_d3d9_arbfp::software::Vec4;
use aero_d3d9_arbfp::{
    FragmentProgramBackend, FunctionQuery, HardwareStatus, PixelShader, ProgramHandle,
    ShaderMode, ShaderVersion, TranslatorConfig, UploadError,
};
use pretty_assertions::assert_eq;

const END: u32 = 0x0000_FFFF;

fn version_token(major: u8, minor: u8) -> u32 {
    0xFFFF_0000 | ((major as u32) << 8) | (minor as u32)
}

fn reg_token(regtype: u8, index: u32) -> u32 {
    let low3 = (regtype as u32) & 0x7;
    let high2 = (regtype as u32) & 0x18;
    0x8000_0000 | (low3 << 28) | (high2 << 8) | (index & 0x7FF)
}

fn dst_token(regtype: u8, index: u32, mask: u8) -> u32 {
    reg_token(regtype, index) | ((mask as u32) << 16)
}

fn src_token(regtype: u8, index: u32, swizzle: u8, srcmod: u8) -> u32 {
    reg_token(regtype, index) | ((swizzle as u32) << 16) | ((srcmod as u32) << 24)
}

/// ps_1_1: mov r0, v0
fn simple_shader() -> Vec<u32> {
    vec![
        version_token(1, 1),
        1,
        dst_token(0, 0, 0xF),
        src_token(1, 0, 0xE4, 0),
        END,
    ]
}

fn le_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[derive(Default)]
struct RecordingBackend {
    uploaded: Vec<String>,
    released: Vec<ProgramHandle>,
    next_handle: u32,
    reject: Option<UploadError>,
}

impl FragmentProgramBackend for RecordingBackend {
    fn upload(&mut self, source: &CStr) -> Result<ProgramHandle, UploadError> {
        self.uploaded
            .push(source.to_str().expect("program text is utf-8").to_owned());
        if let Some(err) = self.reject.clone() {
            return Err(err);
        }
        self.next_handle += 1;
        Ok(ProgramHandle(self.next_handle))
    }

    fn release(&mut self, handle: ProgramHandle) {
        self.released.push(handle);
    }
}

#[test]
fn hardware_mode_uploads_the_generated_program() {
    let mut backend = RecordingBackend::default();
    let mut shader = PixelShader::new(TranslatorConfig::default());

    let status = shader.set_function(Some(&simple_shader()), &mut backend).clone();
    assert_eq!(status, HardwareStatus::Uploaded(ProgramHandle(1)));
    assert!(status.is_usable());
    assert_eq!(backend.uploaded.len(), 1);
    assert_eq!(Some(backend.uploaded[0].as_str()), shader.arb_source());
    assert!(backend.uploaded[0].contains("\nMOV R0, fragment.color.primary;\n"));
}

#[test]
fn get_function_is_two_phase() {
    let mut backend = RecordingBackend::default();
    let mut shader = PixelShader::new(TranslatorConfig::default());
    let words = simple_shader();
    shader.set_function(Some(&words), &mut backend);

    let size = words.len() * 4;
    assert_eq!(shader.get_function(None), FunctionQuery::Size(size));

    let mut small = vec![0xAAu8; size - 1];
    assert_eq!(
        shader.get_function(Some(&mut small)),
        FunctionQuery::MoreData { required: size }
    );
    assert!(small.iter().all(|&b| b == 0xAA));

    let mut buf = vec![0u8; size];
    assert_eq!(shader.get_function(Some(&mut buf)), FunctionQuery::Copied(size));
    assert_eq!(buf, le_bytes(&words));
}

#[test]
fn function_copy_stops_at_the_end_token() {
    let mut backend = RecordingBackend::default();
    let mut shader = PixelShader::new(TranslatorConfig::default());
    let mut words = simple_shader();
    words.extend([0xDEAD_BEEF, 0x1234_5678]);

    shader.set_function(Some(&words), &mut backend);
    assert_eq!(shader.function(), Some(&words[..5]));
    assert_eq!(shader.function_len(), 20);
}

#[test]
fn exhausted_program_text_is_never_uploaded() {
    let mut backend = RecordingBackend::default();
    let config = TranslatorConfig {
        program_capacity: 128,
        ..TranslatorConfig::default()
    };
    let mut shader = PixelShader::new(config);
    let words = simple_shader();

    let status = shader.set_function(Some(&words), &mut backend).clone();
    assert!(matches!(status, HardwareStatus::TranslationFailed(_)));
    assert!(!status.is_usable());
    assert!(backend.uploaded.is_empty());

    let partial = shader.arb_source().expect("partial text kept");
    assert!(partial.len() < 128);
    assert!(partial.starts_with("!!ARBfp1.0\n"));

    let mut buf = vec![0u8; words.len() * 4];
    assert_eq!(
        shader.get_function(Some(&mut buf)),
        FunctionQuery::Copied(words.len() * 4)
    );
    assert_eq!(buf, le_bytes(&words));
}

#[test]
fn rejected_upload_falls_back_to_software() {
    let mut backend = RecordingBackend {
        reject: Some(UploadError {
            position: Some(12),
            message: "unexpected token".to_owned(),
        }),
        ..RecordingBackend::default()
    };
    let mut shader = PixelShader::new(TranslatorConfig::default());

    let status = shader.set_function(Some(&simple_shader()), &mut backend).clone();
    match status {
        HardwareStatus::UploadRejected(err) => assert_eq!(err.position, Some(12)),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(!shader.status().is_usable());

    let exec = shader.software_executor(1).expect("mov executor");
    let v = Vec4::new(0.25, 0.5, 0.75, 1.0);
    assert_eq!(exec.execute(&[v]), Some(v));
}

#[test]
fn version_behind_a_leading_comment_drives_the_software_lookup() {
    let mut backend = RecordingBackend::default();
    let config = TranslatorConfig {
        mode: ShaderMode::Software,
        ..TranslatorConfig::default()
    };
    let mut shader = PixelShader::new(config);
    // comment, ps_1_4, cmp r0, r1, r2, r3
    let words = vec![
        0x0001_FFFE,
        0x0043_4241,
        version_token(1, 4),
        88,
        dst_token(0, 0, 0xF),
        src_token(0, 1, 0xE4, 0),
        src_token(0, 2, 0xE4, 0),
        src_token(0, 3, 0xE4, 0),
        END,
    ];

    shader.set_function(Some(&words), &mut backend);
    assert_eq!(shader.version(), ShaderVersion::new(1, 4));
    assert!(shader.software_executor(88).is_some());

    shader.set_function(None, &mut backend);
    assert_eq!(shader.version(), ShaderVersion::UNVERSIONED);
    assert!(shader.software_executor(88).is_none());
}

#[test]
fn software_mode_skips_translation() {
    let mut backend = RecordingBackend::default();
    let config = TranslatorConfig {
        mode: ShaderMode::Software,
        ..TranslatorConfig::default()
    };
    let mut shader = PixelShader::new(config);

    assert_eq!(
        shader.set_function(Some(&simple_shader()), &mut backend),
        &HardwareStatus::Disabled
    );
    assert!(backend.uploaded.is_empty());
    assert_eq!(shader.arb_source(), None);
    assert_eq!(shader.get_function(None), FunctionQuery::Size(20));
}

#[test]
fn replacing_the_function_releases_the_previous_program() {
    let mut backend = RecordingBackend::default();
    let mut shader = PixelShader::new(TranslatorConfig::default());

    shader.set_function(Some(&simple_shader()), &mut backend);
    shader.set_function(Some(&simple_shader()), &mut backend);
    assert_eq!(backend.released, vec![ProgramHandle(1)]);
    assert_eq!(shader.status(), &HardwareStatus::Uploaded(ProgramHandle(2)));

    assert_eq!(shader.set_function(None, &mut backend), &HardwareStatus::NoFunction);
    assert_eq!(backend.released, vec![ProgramHandle(1), ProgramHandle(2)]);
    assert_eq!(shader.get_function(None), FunctionQuery::Size(0));
}

#[test]
fn byte_input_must_be_word_aligned() {
    let mut backend = RecordingBackend::default();
    let mut shader = PixelShader::new(TranslatorConfig::default());

    assert!(shader.set_function_bytes(&[0, 1, 2], &mut backend).is_err());

    let bytes = le_bytes(&simple_shader());
    let status = shader.set_function_bytes(&bytes, &mut backend).unwrap();
    assert!(status.is_usable());
}
