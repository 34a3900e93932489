use sabre::{compile, Compiler, Pass};

#[test]
fn directive_extends() {
    let fragment = compile("@extends('foo')\r\nfoo");
    assert_eq!(
        fragment,
        "foo\r\n<% echo __env.make('foo', defined_vars()); %>"
    );
}

#[test]
fn directive_extends_not_first_is_ignored() {
    let source = "foo\n@extends('bar')";
    let compiler = Compiler::with_passes([Pass::Inheritance]);
    assert_eq!(compiler.compile(source), source);
    assert_eq!(compile(source), source);
}

#[test]
fn directive_extends_with_sections() {
    let fragment = compile("@extends('layout')\n@section('title')\nHome\n@stop\n");
    assert_eq!(
        fragment,
        "<% __env.start_section('title'); %>\nHome\n<% __env.stop_section(); %>\n\
         <% echo __env.make('layout', defined_vars()); %>"
    );
}

#[test]
fn directive_comments() {
    assert_eq!(compile("{{-- test --}}"), "<% /* test */ %>");
    assert_eq!(compile("{{-- test\n"), "<% // test %>\n");
    assert_eq!(
        compile("{{-- a\nb --}}"),
        "<% /* a\nb */ %>"
    );
}

#[test]
fn directive_echos() {
    assert_eq!(compile("{{ time() }}"), "<% echo time(); %>");
    assert_eq!(compile("{{user.name}}"), "<% echo user.name; %>");
}

#[test]
fn directive_openings() {
    assert_eq!(
        compile("@foreach (comments as comment)"),
        "<% foreach (comments as comment): %>"
    );
    assert_eq!(compile("@while (true)"), "<% while (true): %>");
    assert_eq!(compile("@if(a)"), "<% if (a): %>");
    assert_eq!(compile("@elseif (b)"), "<% elseif (b): %>");
    assert_eq!(
        compile("@for (i = 0; i < 3; i++)"),
        "<% for (i = 0; i < 3; i++): %>"
    );
}

#[test]
fn directive_closings() {
    assert_eq!(compile("@endforeach"), "<% endforeach; %>");
    assert_eq!(compile("@endif"), "<% endif; %>");
    assert_eq!(compile("@endfor"), "<% endfor; %>");
    assert_eq!(compile("@endwhile"), "<% endwhile; %>");
}

#[test]
fn directive_else() {
    assert_eq!(compile("@else"), "<% else: %>");
}

#[test]
fn directive_unless() {
    assert_eq!(compile("@unless (true)"), "<% if (!(true)): %>");
    assert_eq!(compile("@endunless"), "<% endif; %>");
}

#[test]
fn directive_includes() {
    assert_eq!(
        compile("@include('foo')"),
        "<% echo __env.make('foo', defined_vars()); %>"
    );
    assert_eq!(
        compile("@include('foo', ['a' => 1])"),
        "<% echo __env.make('foo', ['a' => 1], defined_vars()); %>"
    );
}

#[test]
fn directive_each() {
    assert_eq!(compile("@each('foo')"), "<% echo __env.show_each('foo'); %>");
}

#[test]
fn directive_yields() {
    assert_eq!(compile("@yield('foo')"), "<% echo __env.yield('foo'); %>");
}

#[test]
fn directive_show() {
    assert_eq!(compile("@show"), "<% echo __env.yield_section(); %>");
}

#[test]
fn directive_section_start() {
    assert_eq!(
        compile("@section('foo')"),
        "<% __env.start_section('foo'); %>"
    );
}

#[test]
fn directive_section_stop() {
    assert_eq!(compile("@stop"), "<% __env.stop_section(); %>");
}

#[test]
fn directive_unknown_is_text() {
    let source = "@media print { @page { margin: 0 } } @stopped";
    assert_eq!(compile(source), source);
}

#[test]
fn directive_directly_after_word() {
    assert_eq!(
        compile("@section('title')Home@stop"),
        "<% __env.start_section('title'); %>Home<% __env.stop_section(); %>"
    );
    assert_eq!(
        compile("@if (true)yes@endif"),
        "<% if (true): %>yes<% endif; %>"
    );
    assert_eq!(
        compile("x@include('part')y"),
        "x<% echo __env.make('part', defined_vars()); %>y"
    );
}

#[test]
fn directive_args_with_parens_in_strings() {
    assert_eq!(
        compile("@yield('a)b') tail"),
        "<% echo __env.yield('a)b'); %> tail"
    );
}

#[test]
fn directive_single_pass() {
    let compiler = Compiler::with_passes([Pass::Echos]);
    assert_eq!(
        compiler.compile("{{ a }} @stop"),
        "<% echo a; %> @stop"
    );
}

#[test]
fn directive_all_passes_in_order() {
    assert_eq!(Compiler::new().passes(), Pass::ALL);
    assert_eq!(Pass::ALL[0], Pass::Inheritance);
    assert_eq!(Pass::ALL[12], Pass::SectionStop);
}
