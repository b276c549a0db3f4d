//! Synthetic application packages.

#![allow(dead_code)]

use droidaudit::dex::builder::{ClassBuilder, DexBuilder, Insn, InvokeKind, MethodBuilder};
use droidaudit::dex::MethodRef;
use droidaudit::resources::manifest::attrs;
use droidaudit::resources::writer::{TableBuilder, XmlWriter};
use droidaudit::resources::xml::{Namespace, XmlAttribute, XmlNode, ANDROID_NS};
use droidaudit::resources::{Config, Value};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PACKAGE: &str = "com.example.demo";
pub const APP_NAME: u32 = 0x7f01_0000;

pub fn android(name: &str, id: u32, value: Value) -> XmlAttribute {
    XmlAttribute {
        namespace: Some(ANDROID_NS.to_string()),
        name: name.to_string(),
        resource_id: Some(id),
        raw: None,
        value,
    }
}

pub fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn element(name: &str, attributes: Vec<XmlAttribute>, children: Vec<XmlNode>) -> XmlNode {
    XmlNode {
        attributes,
        children,
        ..XmlNode::new(name)
    }
}

pub fn named(tag: &str, name: &str, children: Vec<XmlNode>) -> XmlNode {
    element(tag, vec![android("name", attrs::NAME, string(name))], children)
}

/// A launcher activity `.MainActivity`, requiring the network permission.
/// The application label refers to `label`.
pub fn manifest(label: u32) -> Vec<u8> {
    let filter = element(
        "intent-filter",
        vec![],
        vec![
            named("action", "android.intent.action.MAIN", vec![]),
            named("category", "android.intent.category.LAUNCHER", vec![]),
        ],
    );
    let application = element(
        "application",
        vec![
            android("label", attrs::LABEL, Value::Reference(label)),
            android("allowBackup", attrs::ALLOW_BACKUP, Value::Boolean(false)),
        ],
        vec![
            named("activity", ".MainActivity", vec![filter]),
            named("service", ".SyncService", vec![]),
        ],
    );
    let mut root = element(
        "manifest",
        vec![
            XmlAttribute {
                namespace: None,
                name: "package".to_string(),
                resource_id: None,
                raw: None,
                value: string(PACKAGE),
            },
            android("versionCode", attrs::VERSION_CODE, Value::IntDec(3)),
            android("versionName", attrs::VERSION_NAME, string("1.0.2")),
        ],
        vec![
            named("uses-permission", "android.permission.INTERNET", vec![]),
            element(
                "uses-sdk",
                vec![
                    android("minSdkVersion", attrs::MIN_SDK_VERSION, Value::IntDec(24)),
                    android("targetSdkVersion", attrs::TARGET_SDK_VERSION, Value::IntDec(33)),
                ],
                vec![],
            ),
            application,
        ],
    );
    root.namespaces.push(Namespace {
        prefix: Some("android".to_string()),
        uri: ANDROID_NS.to_string(),
    });
    XmlWriter::new().write(&root)
}

pub fn resources() -> Vec<u8> {
    TableBuilder::new(0x7f, PACKAGE)
        .entry("string", "app_name", Config::default(), string("Demo"))
        .entry(
            "string",
            "app_name",
            Config::from_locale("fr").unwrap(),
            string("Démo"),
        )
        .build()
}

/// `MainActivity.onCreate` fetches a cleartext URL through a helper.
/// `SyncService` is not exported, its code is not reachable.
pub fn classes() -> Vec<u8> {
    let activity = format!("{PACKAGE}.MainActivity");
    let helper = format!("{PACKAGE}.net.Fetcher");
    let service = format!("{PACKAGE}.SyncService");
    let fetch = MethodRef::new(&helper, "fetch", "()V");

    let mut builder = DexBuilder::new();
    builder
        .class(
            ClassBuilder::new(&activity)
                .superclass("android.app.Activity")
                .source_file("MainActivity.java")
                .method(
                    MethodBuilder::new("<init>", "()V").code(vec![
                        Insn::Invoke(
                            InvokeKind::Direct,
                            MethodRef::new("android.app.Activity", "<init>", "()V"),
                        ),
                        Insn::ReturnVoid,
                    ]),
                )
                .method(
                    MethodBuilder::new("onCreate", "(Landroid/os/Bundle;)V").code(vec![
                        Insn::NewInstance(helper.clone()),
                        Insn::Invoke(InvokeKind::Static, fetch.clone()),
                        Insn::ReturnVoid,
                    ]),
                ),
        )
        .class(
            ClassBuilder::new(&helper).method(
                MethodBuilder::new("fetch", "()V")
                    .flags(droidaudit::dex::AccessFlags::ACC_PUBLIC | droidaudit::dex::AccessFlags::ACC_STATIC)
                    .code(vec![
                        Insn::ConstString("http://api.example.com/v1/items".to_string()),
                        Insn::Invoke(
                            InvokeKind::Virtual,
                            MethodRef::new("java.net.URL", "openConnection", "()Ljava/net/URLConnection;"),
                        ),
                        Insn::ReturnVoid,
                    ]),
            ),
        )
        .class(
            ClassBuilder::new(&service)
                .superclass("android.app.Service")
                .method(
                    MethodBuilder::new("onCreate", "()V").code(vec![
                        Insn::ConstString("http://internal.example.com".to_string()),
                        Insn::ReturnVoid,
                    ]),
                ),
        );
    builder.build().unwrap()
}

pub fn zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn apk() -> Vec<u8> {
    zip(&[
        ("AndroidManifest.xml", manifest(APP_NAME)),
        ("resources.arsc", resources()),
        ("classes.dex", classes()),
    ])
}
